// crates/tf_physics/src/linear_algebra/cg.rs

//! 分布式共轭梯度
//!
//! 每个分区持有整体矩阵的部分装配（本分区单元的贡献）。
//! 迭代中两类通信：
//! - 分区边界节点上 r = b - A·x 与 q = A·p 的部分和交换（Add 合并）
//! - 范数/点积 (normb, rho, pq) 的全归约
//!
//! 点积只对本分区所有的节点求和，避免共享节点重复计数。
//! 归约是同步点，每轮迭代的消息用 (阶段名, 轮次) 标签隔离。
//! 达到最大迭代数仍未收敛报 `SolverDiverged`。

use std::collections::BTreeMap;

use tf_foundation::{TfError, TfResult};
use tf_mesh::MeshChunk;
use tf_runtime::{Communicator, MergeOp, ReduceOp, Tag};

use super::csr::CsrMatrix;

/// 共轭梯度参数
#[derive(Debug, Clone, Copy)]
pub struct CgConfig {
    pub maxit: usize,
    pub tol: f64,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            maxit: 200,
            tol: 1.0e-10,
        }
    }
}

/// 收敛统计
#[derive(Debug, Clone, Copy)]
pub struct CgStats {
    pub iterations: usize,
    pub residual: f64,
}

/// 分区边界节点部分和交换: v 就地补全
fn combine(
    v: &mut [f64],
    chunk: &MeshChunk,
    comm: &mut Communicator,
    stage: &'static str,
    round: u64,
) -> TfResult<()> {
    if chunk.node_comm.is_empty() {
        return Ok(());
    }
    let mut outgoing: BTreeMap<usize, Vec<(usize, Vec<f64>)>> = BTreeMap::new();
    for (&peer, shared) in &chunk.node_comm {
        let entries = shared
            .iter()
            .map(|&g| (g, vec![v[chunk.lid[&g]]]))
            .collect();
        outgoing.insert(peer, entries);
    }
    let peers: Vec<usize> = chunk.node_comm.keys().copied().collect();
    let merged = comm.exchange(Tag::new(stage, round), &outgoing, &peers, MergeOp::Add)?;
    for (g, vals) in merged {
        v[chunk.lid[&g]] += vals[0];
    }
    Ok(())
}

/// 去重点积: 只累加本分区所有的节点
fn owned_dot(a: &[f64], b: &[f64], owned: &[bool]) -> f64 {
    a.iter()
        .zip(b)
        .zip(owned)
        .filter(|&(_, &o)| o)
        .map(|((x, y), _)| x * y)
        .sum()
}

/// 分布式共轭梯度求解 A·x = b
///
/// `a` 与 `b` 均为本分区的部分装配；解出的 `x` 在共享节点上
/// 各分区一致。`round` 区分同一次运行内的多次求解。
pub fn solve(
    a: &CsrMatrix,
    b: &[f64],
    x: &mut [f64],
    chunk: &MeshChunk,
    comm: &mut Communicator,
    round: u64,
    cfg: &CgConfig,
) -> TfResult<CgStats> {
    let n = a.nrow();
    if b.len() != n || x.len() != n {
        return Err(TfError::SizeMismatch {
            name: "线性系统规模",
            expected: n,
            actual: b.len().min(x.len()),
        });
    }
    // 每轮迭代一组标签, 轮次不跨求解复用
    let base = round * (cfg.maxit as u64 + 1);

    // 右端项与初始残差补全
    let mut bc = b.to_vec();
    combine(&mut bc, chunk, comm, "cg-b", base)?;
    let mut q = vec![0.0; n];
    a.mult(x, &mut q)?;
    combine(&mut q, chunk, comm, "cg-ax", base)?;
    let mut r: Vec<f64> = bc.iter().zip(&q).map(|(b, q)| b - q).collect();

    let normb2 = comm.allreduce(
        Tag::new("cg-normb", base),
        &[owned_dot(&bc, &bc, &chunk.owned)],
        ReduceOp::Sum,
    )?[0];
    let normb = normb2.sqrt().max(f64::EPSILON);

    let mut rho = comm.allreduce(
        Tag::new("cg-rho", base),
        &[owned_dot(&r, &r, &chunk.owned)],
        ReduceOp::Sum,
    )?[0];
    let mut p = r.clone();

    for it in 0..cfg.maxit {
        let tagr = base + 1 + it as u64;
        a.mult(&p, &mut q)?;
        combine(&mut q, chunk, comm, "cg-q", tagr)?;

        let pq = comm.allreduce(
            Tag::new("cg-pq", tagr),
            &[owned_dot(&p, &q, &chunk.owned)],
            ReduceOp::Sum,
        )?[0];
        if pq.abs() < f64::MIN_POSITIVE {
            return Err(TfError::SolverDiverged {
                iterations: it,
                residual: rho.sqrt(),
                tolerance: cfg.tol * normb,
            });
        }
        let alpha = rho / pq;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * q[i];
        }

        let rho_new = comm.allreduce(
            Tag::new("cg-normres", tagr),
            &[owned_dot(&r, &r, &chunk.owned)],
            ReduceOp::Sum,
        )?[0];
        let res = rho_new.sqrt();
        if res <= cfg.tol * normb {
            tracing::debug!(iterations = it + 1, residual = res, "共轭梯度收敛");
            return Ok(CgStats {
                iterations: it + 1,
                residual: res,
            });
        }
        let beta = rho_new / rho;
        rho = rho_new;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
    }

    Err(TfError::SolverDiverged {
        iterations: cfg.maxit,
        residual: rho.sqrt(),
        tolerance: cfg.tol * normb,
    })
}

/// 串行共轭梯度（单分区, 无通信）
pub fn solve_serial(
    a: &CsrMatrix,
    b: &[f64],
    x: &mut [f64],
    cfg: &CgConfig,
) -> TfResult<CgStats> {
    let n = a.nrow();
    if b.len() != n || x.len() != n {
        return Err(TfError::SizeMismatch {
            name: "线性系统规模",
            expected: n,
            actual: b.len().min(x.len()),
        });
    }
    let mut q = vec![0.0; n];
    a.mult(x, &mut q)?;
    let mut r: Vec<f64> = b.iter().zip(&q).map(|(b, q)| b - q).collect();
    let normb = b.iter().map(|v| v * v).sum::<f64>().sqrt().max(f64::EPSILON);
    let mut rho: f64 = r.iter().map(|v| v * v).sum();
    let mut p = r.clone();

    for it in 0..cfg.maxit {
        a.mult(&p, &mut q)?;
        let pq: f64 = p.iter().zip(&q).map(|(a, b)| a * b).sum();
        if pq.abs() < f64::MIN_POSITIVE {
            return Err(TfError::SolverDiverged {
                iterations: it,
                residual: rho.sqrt(),
                tolerance: cfg.tol * normb,
            });
        }
        let alpha = rho / pq;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * q[i];
        }
        let rho_new: f64 = r.iter().map(|v| v * v).sum();
        if rho_new.sqrt() <= cfg.tol * normb {
            return Ok(CgStats {
                iterations: it + 1,
                residual: rho_new.sqrt(),
            });
        }
        let beta = rho_new / rho;
        rho = rho_new;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
    }
    Err(TfError::SolverDiverged {
        iterations: cfg.maxit,
        residual: rho.sqrt(),
        tolerance: cfg.tol * normb,
    })
}
