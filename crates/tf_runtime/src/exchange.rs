// crates/tf_runtime/src/exchange.rs

//! 分区通信器
//!
//! 用多生产者单消费者通道实现分区间的点对点消息传递，
//! 在其上提供三类集合操作：
//! - `exchange`: 按对端分发条目并合并到齐的回复（边界贡献交换）
//! - `allreduce`: 标量向量的全归约（范数、点积、时间步长）
//! - `abort`: 向所有对端广播致命错误
//!
//! 消息带 (阶段名, 轮次) 标签；乱序到达的消息暂存在本地队列，
//! 接收端只消费与当前标签匹配的消息，保证不同阶段互不串扰。
//! 任何接收点观察到中止消息都会立即返回 `TfError::Aborted`。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use tf_foundation::{TfError, TfResult};

use crate::comm::{ContribBuffer, MergeOp};

/// 消息标签：阶段名 + 轮次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub stage: &'static str,
    pub round: u64,
}

impl Tag {
    pub fn new(stage: &'static str, round: u64) -> Self {
        Self { stage, round }
    }
}

/// 消息载荷
#[derive(Debug, Clone)]
enum Payload {
    /// (全局编号, 分量值) 条目列表
    Entries(Vec<(usize, Vec<f64>)>),
    /// 标量向量（归约用）
    Scalars(Vec<f64>),
    /// 致命错误广播
    Abort(String),
}

#[derive(Debug)]
struct Envelope {
    from: usize,
    tag: Tag,
    payload: Payload,
}

/// 标量归约算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    #[inline]
    fn apply(self, acc: &mut [f64], incoming: &[f64]) {
        for (a, &b) in acc.iter_mut().zip(incoming) {
            match self {
                ReduceOp::Sum => *a += b,
                ReduceOp::Min => *a = a.min(b),
                ReduceOp::Max => *a = a.max(b),
            }
        }
    }
}

/// 全体分区的通道集合
pub struct Channels;

impl Channels {
    /// 创建 `nparts` 个互联的通信器，每个交给一个工作者线程
    pub fn create(nparts: usize) -> Vec<Communicator> {
        let mut senders = Vec::with_capacity(nparts);
        let mut receivers = Vec::with_capacity(nparts);
        for _ in 0..nparts {
            let (tx, rx) = channel::<Envelope>();
            senders.push(tx);
            receivers.push(rx);
        }
        let abort_reason: Arc<Mutex<Option<(usize, String)>>> = Arc::new(Mutex::new(None));
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| Communicator {
                rank,
                nparts,
                senders: senders.clone(),
                receiver,
                pending: VecDeque::new(),
                abort_reason: abort_reason.clone(),
            })
            .collect()
    }
}

/// 单个分区持有的通信端点
pub struct Communicator {
    rank: usize,
    nparts: usize,
    senders: Vec<Sender<Envelope>>,
    receiver: Receiver<Envelope>,
    /// 乱序到达、尚未消费的消息
    pending: VecDeque<Envelope>,
    /// 全局中止原因（首个致命错误）
    abort_reason: Arc<Mutex<Option<(usize, String)>>>,
}

impl Communicator {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn nparts(&self) -> usize {
        self.nparts
    }

    /// 已观察到的全局中止（若有）
    pub fn aborted(&self) -> Option<TfError> {
        self.abort_reason
            .lock()
            .as_ref()
            .map(|(rank, reason)| TfError::Aborted {
                rank: *rank,
                reason: reason.clone(),
            })
    }

    fn send(&self, peer: usize, tag: Tag, payload: Payload) -> TfResult<()> {
        self.senders[peer]
            .send(Envelope {
                from: self.rank,
                tag,
                payload,
            })
            .map_err(|_| TfError::protocol(format!("分区 {peer} 的通道已关闭")))
    }

    /// 接收下一条标签匹配的消息；中止消息立即升级为错误
    fn recv_matching(&mut self, tag: Tag) -> TfResult<(usize, Payload)> {
        // 先查暂存队列
        if let Some(pos) = self.pending.iter().position(|e| e.tag == tag) {
            let env = self.pending.remove(pos).map_or_else(
                || Err(TfError::protocol("暂存队列索引失效")),
                Ok,
            )?;
            return Ok((env.from, env.payload));
        }
        loop {
            let env = self
                .receiver
                .recv()
                .map_err(|_| self.aborted().unwrap_or_else(|| {
                    TfError::protocol("所有对端通道已关闭")
                }))?;
            if let Payload::Abort(reason) = &env.payload {
                tracing::warn!(from = env.from, reason = %reason, "收到中止广播");
                let mut slot = self.abort_reason.lock();
                if slot.is_none() {
                    *slot = Some((env.from, reason.clone()));
                }
                return Err(TfError::Aborted {
                    rank: env.from,
                    reason: reason.clone(),
                });
            }
            if env.tag == tag {
                return Ok((env.from, env.payload));
            }
            self.pending.push_back(env);
        }
    }

    /// 边界贡献交换
    ///
    /// 向每个对端发送其应得的条目，然后阻塞接收全部对端的回赠条目，
    /// 按 `op` 合并后返回（全局编号 → 合并值）。合并恰好发生一次。
    pub fn exchange(
        &mut self,
        tag: Tag,
        outgoing: &BTreeMap<usize, Vec<(usize, Vec<f64>)>>,
        expected_from: &[usize],
        op: MergeOp,
    ) -> TfResult<HashMap<usize, Vec<f64>>> {
        if let Some(err) = self.aborted() {
            return Err(err);
        }
        for (&peer, entries) in outgoing {
            self.send(peer, tag, Payload::Entries(entries.clone()))?;
        }
        let mut buf = ContribBuffer::new(expected_from.iter().copied(), op);
        buf.begin_round();
        while !buf.complete() {
            let (from, payload) = self.recv_matching(tag)?;
            match payload {
                Payload::Entries(entries) => {
                    buf.receive(from, &entries)?;
                }
                _ => {
                    return Err(TfError::protocol(format!(
                        "阶段 {} 期望条目消息, 收到标量", tag.stage
                    )))
                }
            }
        }
        buf.take()
    }

    /// 标量全归约（范数、点积、全局时间步长）
    ///
    /// 所有分区都贡献并收到同一结果后才返回；这是一个同步点。
    pub fn allreduce(&mut self, tag: Tag, values: &[f64], op: ReduceOp) -> TfResult<Vec<f64>> {
        if let Some(err) = self.aborted() {
            return Err(err);
        }
        for peer in 0..self.nparts {
            if peer != self.rank {
                self.send(peer, tag, Payload::Scalars(values.to_vec()))?;
            }
        }
        let mut acc = values.to_vec();
        let mut seen = vec![false; self.nparts];
        seen[self.rank] = true;
        let mut remaining = self.nparts - 1;
        while remaining > 0 {
            let (from, payload) = self.recv_matching(tag)?;
            match payload {
                Payload::Scalars(v) => {
                    if seen[from] {
                        return Err(TfError::protocol(format!(
                            "分区 {from} 在归约 {} 中重复贡献", tag.stage
                        )));
                    }
                    if v.len() != acc.len() {
                        return Err(TfError::SizeMismatch {
                            name: "归约向量长度",
                            expected: acc.len(),
                            actual: v.len(),
                        });
                    }
                    seen[from] = true;
                    op.apply(&mut acc, &v);
                    remaining -= 1;
                }
                _ => {
                    return Err(TfError::protocol(format!(
                        "阶段 {} 期望标量消息, 收到条目", tag.stage
                    )))
                }
            }
        }
        Ok(acc)
    }

    /// 向所有对端广播致命错误
    ///
    /// 发送失败（对端已退出）不再升级，中止本身就是终态。
    pub fn abort(&self, reason: &str) {
        tracing::error!(rank = self.rank, reason, "广播致命错误, 中止分布式计算");
        {
            let mut slot = self.abort_reason.lock();
            if slot.is_none() {
                *slot = Some((self.rank, reason.to_string()));
            }
        }
        for peer in 0..self.nparts {
            if peer != self.rank {
                let _ = self.senders[peer].send(Envelope {
                    from: self.rank,
                    tag: Tag::new("abort", 0),
                    payload: Payload::Abort(reason.to_string()),
                });
            }
        }
    }
}
