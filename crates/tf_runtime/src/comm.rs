// crates/tf_runtime/src/comm.rs

//! 分区边界贡献缓冲区
//!
//! 按全局编号收集来自远端分区的部分贡献（左端项、右端项、
//! 梯度、反扩散界等），并用计数器跟踪已到达的分区数。
//! 合并事件每轮恰好触发一次：当且仅当全部期望分区的贡献到齐。
//! 重复接收同一分区、或在未到齐/已合并状态下取结果都是协议错误。

use std::collections::{BTreeSet, HashMap};

use tf_foundation::{TfError, TfResult};

/// 分量级合并算子
///
/// 求和用于贡献累加（lhs/rhs/梯度），最小/最大用于界交换。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOp {
    Add,
    Min,
    Max,
}

impl MergeOp {
    /// 把 `incoming` 按算子合并进 `acc`
    #[inline]
    pub fn apply(self, acc: &mut [f64], incoming: &[f64]) {
        for (a, &b) in acc.iter_mut().zip(incoming) {
            match self {
                MergeOp::Add => *a += b,
                MergeOp::Min => *a = a.min(b),
                MergeOp::Max => *a = a.max(b),
            }
        }
    }
}

/// 一轮通信的接收缓冲区
///
/// 典型用法：`begin_round` → 多次 `receive`（每个期望分区一次）
/// → `receive` 返回 `true` 后调用 `take` 取走合并结果。
#[derive(Debug)]
pub struct ContribBuffer {
    /// 期望贡献的对端分区集合
    expected: BTreeSet<usize>,
    /// 本轮已到达的分区
    arrived: BTreeSet<usize>,
    /// 合并算子
    op: MergeOp,
    /// 全局编号 → 累加值
    data: HashMap<usize, Vec<f64>>,
    /// 本轮是否已经合并
    merged: bool,
}

impl ContribBuffer {
    pub fn new(expected: impl IntoIterator<Item = usize>, op: MergeOp) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            arrived: BTreeSet::new(),
            op,
            data: HashMap::new(),
            merged: false,
        }
    }

    /// 开始新一轮：清空到达计数与数据
    pub fn begin_round(&mut self) {
        self.arrived.clear();
        self.data.clear();
        self.merged = false;
    }

    /// 本轮是否到齐
    pub fn complete(&self) -> bool {
        self.arrived == self.expected
    }

    /// 接收一个分区的贡献，返回本轮是否到齐
    ///
    /// 同一分区在一轮内重复到达、或非期望分区到达均为协议错误。
    pub fn receive(&mut self, from: usize, entries: &[(usize, Vec<f64>)]) -> TfResult<bool> {
        if !self.expected.contains(&from) {
            return Err(TfError::protocol(format!("收到非期望分区 {from} 的贡献")));
        }
        if !self.arrived.insert(from) {
            return Err(TfError::protocol(format!("分区 {from} 在同一轮内重复贡献")));
        }
        for (gid, values) in entries {
            match self.data.get_mut(gid) {
                Some(acc) => {
                    if acc.len() != values.len() {
                        return Err(TfError::SizeMismatch {
                            name: "边界贡献分量数",
                            expected: acc.len(),
                            actual: values.len(),
                        });
                    }
                    self.op.apply(acc, values);
                }
                None => {
                    self.data.insert(*gid, values.clone());
                }
            }
        }
        Ok(self.complete())
    }

    /// 取走合并结果（合并事件）
    ///
    /// 未到齐或重复合并为协议错误；成功后缓冲区回到空状态。
    pub fn take(&mut self) -> TfResult<HashMap<usize, Vec<f64>>> {
        if self.merged {
            return Err(TfError::protocol("同一轮贡献被合并多次"));
        }
        if !self.complete() {
            return Err(TfError::protocol(format!(
                "贡献未到齐即尝试合并: {}/{}",
                self.arrived.len(),
                self.expected.len()
            )));
        }
        self.merged = true;
        Ok(std::mem::take(&mut self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_once_per_round() {
        let mut buf = ContribBuffer::new([1, 2], MergeOp::Add);
        buf.begin_round();
        assert!(!buf.receive(1, &[(10, vec![1.0, 2.0])]).unwrap());
        assert!(buf.receive(2, &[(10, vec![0.5, -1.0])]).unwrap());
        let merged = buf.take().unwrap();
        assert_eq!(merged[&10], vec![1.5, 1.0]);
        // 第二次合并报错
        assert!(buf.take().is_err());
        // 新一轮后恢复正常
        buf.begin_round();
        assert!(buf.take().is_err());
    }

    #[test]
    fn test_duplicate_contribution_rejected() {
        let mut buf = ContribBuffer::new([1], MergeOp::Add);
        buf.begin_round();
        buf.receive(1, &[]).unwrap();
        assert!(buf.receive(1, &[]).is_err());
        assert!(buf.receive(3, &[]).is_err());
    }

    #[test]
    fn test_min_max_merge() {
        let mut buf = ContribBuffer::new([1, 2], MergeOp::Min);
        buf.begin_round();
        buf.receive(1, &[(5, vec![3.0])]).unwrap();
        buf.receive(2, &[(5, vec![-1.0])]).unwrap();
        assert_eq!(buf.take().unwrap()[&5], vec![-1.0]);

        let mut buf = ContribBuffer::new([1, 2], MergeOp::Max);
        buf.begin_round();
        buf.receive(1, &[(5, vec![3.0])]).unwrap();
        buf.receive(2, &[(5, vec![-1.0])]).unwrap();
        assert_eq!(buf.take().unwrap()[&5], vec![3.0]);
    }

    #[test]
    fn test_empty_expected_is_immediately_complete() {
        let mut buf = ContribBuffer::new([], MergeOp::Add);
        buf.begin_round();
        assert!(buf.complete());
        assert!(buf.take().unwrap().is_empty());
    }
}
