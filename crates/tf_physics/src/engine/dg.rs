// crates/tf_physics/src/engine/dg.rs

//! 单元格式时间推进器
//!
//! 推进单元为中心的多材料体系。P0 用显式欧拉，P1 用两段
//! SSP Runge-Kutta；每个阶段内依次：
//! 1. 阶段更新本块单元，幽灵解同步（跨分区面两侧看到同一状态）
//! 2. 限制线性自由度（P1）
//! 3. 痕量材料修正 + 瞬时压力松弛（若配置）
//! 4. 幽灵解再次同步，使下一阶段从已限制/已修正的邻居状态出发
//!
//! 正交基使质量矩阵对角，阶段更新是逐单元的纯局部操作；
//! 分区耦合只发生在幽灵同步与 dt 的 Min 全归约。

use std::collections::BTreeMap;

use tf_foundation::{TfError, TfResult};
use tf_mesh::{CellChunk, DerivedConnectivity, FaceConnectivity, TetMesh};
use tf_runtime::{Communicator, MergeOp, ReduceOp, Tag};

use crate::basis;
use crate::boundary::BcTable;
use crate::fields::Fields;
use crate::limiter::{create_limiter, LimiterContext, SlopeLimiter};
use crate::pde::MultiMat;
use crate::types::FlowConfig;

/// 一步推进的结果
#[derive(Debug, Clone, Copy)]
pub struct CellStepReport {
    pub step: u64,
    pub t: f64,
    pub dt: f64,
}

/// 单元格式分区推进器
pub struct CellStepper {
    chunk: CellChunk,
    faces: FaceConnectivity,
    esup: Vec<Vec<usize>>,
    mm: MultiMat,
    cfg: FlowConfig,
    bc: BcTable,
    limiter: Box<dyn SlopeLimiter>,
    /// 每单元每自由度的对角质量 vol·[1, 1/10, 3/10, 3/5]
    mass: Vec<Vec<f64>>,
    u: Fields,
    t: f64,
    step: u64,
}

impl CellStepper {
    /// 串行构造（整体网格包成单分区块）
    pub fn new(mesh: TetMesh, mm: MultiMat, cfg: FlowConfig, bc: BcTable) -> TfResult<Self> {
        Self::new_partitioned(CellChunk::serial(mesh), mm, cfg, bc)
    }

    /// 分区构造，`chunk` 带点邻接幽灵层
    pub fn new_partitioned(
        chunk: CellChunk,
        mm: MultiMat,
        cfg: FlowConfig,
        bc: BcTable,
    ) -> TfResult<Self> {
        cfg.validate()?;
        if mm.ndof() != cfg.ndof {
            return Err(TfError::config(format!(
                "方程体系自由度 {} 与配置 {} 不一致",
                mm.ndof(),
                cfg.ndof
            )));
        }
        let faces = FaceConnectivity::build(&chunk.mesh)?;
        let gid: Vec<usize> = (0..chunk.mesh.nnode()).collect();
        let derived = DerivedConnectivity::build(&chunk.mesh, &gid)?;
        let mass = (0..chunk.mesh.nelem())
            .map(|e| {
                let geo = chunk.mesh.element_geometry(e)?;
                Ok(basis::mass_diag(mm.ndof(), geo.jacobian / 6.0))
            })
            .collect::<TfResult<Vec<_>>>()?;
        let limiter = create_limiter(cfg.limiter);
        let u = Fields::new(chunk.mesh.nelem(), mm.ncomp() * mm.ndof());
        Ok(Self {
            chunk,
            faces,
            esup: derived.esup,
            mm,
            cfg,
            bc,
            limiter,
            mass,
            u,
            t: 0.0,
            step: 0,
        })
    }

    /// 初始条件投影
    ///
    /// 幽灵单元也直接按解析初值投影，与所属分区逐位一致，
    /// 因此初始化无需通信。
    pub fn initialize(&mut self) -> TfResult<()> {
        self.mm.initialize(&self.chunk.mesh, self.t, &mut self.u)?;
        self.post_stage()
    }

    pub fn solution(&self) -> &Fields {
        &self.u
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn mesh(&self) -> &TetMesh {
        &self.chunk.mesh
    }

    pub fn chunk(&self) -> &CellChunk {
        &self.chunk
    }

    pub fn system(&self) -> &MultiMat {
        &self.mm
    }

    /// 一个 RK 阶段: out = un·w0 + (uin + dt·M⁻¹·r(uin))·w1
    ///
    /// 只推进本块单元；幽灵行原样带过，随后由幽灵同步覆写。
    fn rk_stage(
        &self,
        dt: f64,
        t: f64,
        un: &Fields,
        uin: &Fields,
        w0: f64,
        w1: f64,
    ) -> TfResult<Fields> {
        let ndof = self.mm.ndof();
        let ncomp = self.mm.ncomp();
        let mesh = &self.chunk.mesh;
        let mut r = Fields::new(mesh.nelem(), ncomp * ndof);
        self.mm.rhs(mesh, &self.faces, &self.bc, t, uin, &mut r)?;
        let mut out = Fields::new(mesh.nelem(), ncomp * ndof);
        for e in 0..self.chunk.nelem_owned {
            for c in 0..ncomp {
                for i in 0..ndof {
                    let k = c * ndof + i;
                    let euler = uin.get(e, k) + dt * r.get(e, k) / self.mass[e][i];
                    out.set(e, k, w0 * un.get(e, k) + w1 * euler);
                }
            }
        }
        for e in self.chunk.nelem_owned..mesh.nelem() {
            out.row_mut(e).copy_from_slice(uin.row(e));
        }
        Ok(out)
    }

    /// 幽灵解同步: 发送本块更新行, 用所属分区发来的行覆写幽灵行
    fn sync_ghosts(&mut self, comm: &mut Communicator, stage: &'static str) -> TfResult<()> {
        if self.chunk.send.is_empty() {
            return Ok(());
        }
        let mut outgoing: BTreeMap<usize, Vec<(usize, Vec<f64>)>> = BTreeMap::new();
        for (&peer, elems) in &self.chunk.send {
            outgoing.insert(
                peer,
                elems
                    .iter()
                    .map(|&e| (self.chunk.egid[e], self.u.row(e).to_vec()))
                    .collect(),
            );
        }
        let peers: Vec<usize> = self.chunk.send.keys().copied().collect();
        let merged = comm.exchange(Tag::new(stage, self.step), &outgoing, &peers, MergeOp::Add)?;
        let width = self.mm.ncomp() * self.mm.ndof();
        for (g, vals) in merged {
            let l = *self
                .chunk
                .ghost_lid
                .get(&g)
                .ok_or_else(|| TfError::protocol(format!("收到非幽灵单元 {g} 的解")))?;
            if vals.len() != width {
                return Err(TfError::SizeMismatch {
                    name: "幽灵单元解行宽",
                    expected: width,
                    actual: vals.len(),
                });
            }
            // 每个幽灵只有唯一所属分区贡献, Add 合并即覆写
            self.u.row_mut(l).copy_from_slice(&vals);
        }
        Ok(())
    }

    /// 阶段收尾: 限制 + 痕量修正/压力松弛
    fn post_stage(&mut self) -> TfResult<()> {
        if self.mm.ndof() > 1 {
            let ctx = LimiterContext {
                mesh: &self.chunk.mesh,
                faces: &self.faces,
                esup: &self.esup,
                ndof: self.mm.ndof(),
                ncomp: self.mm.ncomp(),
            };
            self.limiter.limit(&ctx, &mut self.u)?;
        }
        self.mm.cleanup(&self.chunk.mesh, &mut self.u)
    }

    /// 推进一步
    pub fn step(&mut self, comm: &mut Communicator) -> TfResult<CellStepReport> {
        if let Some(err) = comm.aborted() {
            return Err(err);
        }
        let dt = match self.cfg.dt_fixed {
            Some(fixed) => fixed,
            None => {
                let local = self.mm.dt(&self.chunk.mesh, &self.u, self.cfg.cfl)?;
                comm.allreduce(Tag::new("cell-dt", self.step), &[local], ReduceOp::Min)?[0]
            }
        };

        let un = self.u.clone();
        if self.mm.ndof() > 1 {
            // SSP RK2
            self.u = self.rk_stage(dt, self.t, &un, &un, 0.0, 1.0)?;
            self.sync_ghosts(comm, "cell-sol0")?;
            self.post_stage()?;
            self.sync_ghosts(comm, "cell-fin0")?;
            let u1 = self.u.clone();
            self.u = self.rk_stage(dt, self.t + dt, &un, &u1, 0.5, 0.5)?;
            self.sync_ghosts(comm, "cell-sol1")?;
            self.post_stage()?;
            self.sync_ghosts(comm, "cell-fin1")?;
        } else {
            self.u = self.rk_stage(dt, self.t, &un, &un, 0.0, 1.0)?;
            self.sync_ghosts(comm, "cell-sol0")?;
            self.post_stage()?;
            self.sync_ghosts(comm, "cell-fin0")?;
        }

        self.t += dt;
        self.step += 1;
        Ok(CellStepReport {
            step: self.step,
            t: self.t,
            dt,
        })
    }

    /// 推进 `nsteps` 步；致命错误广播中止
    pub fn run(&mut self, comm: &mut Communicator, nsteps: u64) -> TfResult<CellStepReport> {
        let mut last = CellStepReport {
            step: self.step,
            t: self.t,
            dt: 0.0,
        };
        for _ in 0..nsteps {
            match self.step(comm) {
                Ok(report) => {
                    tracing::debug!(step = report.step, t = report.t, dt = report.dt, "单元格式推进一步");
                    last = report;
                }
                Err(e) => {
                    if e.is_fatal() {
                        comm.abort(&e.to_string());
                    }
                    return Err(e);
                }
            }
        }
        Ok(last)
    }
}
