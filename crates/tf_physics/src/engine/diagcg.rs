// crates/tf_physics/src/engine/diagcg.rs

//! 点格式时间推进器
//!
//! 每个分区一个推进器，推进节点为中心的方程体系
//! （标量输运 / 单材料可压缩流）。一步的流水线：
//!
//! 1. 时间步长: 本地 CFL 步长 → Min 全归约
//! 2. 残差装配（两阶段或边格式）→ 分区边界部分和交换
//! 3. 高阶增量: 一致质量阵 M_c·Δu^H = r, 分布式共轭梯度求解;
//!    关闭 FCT 时直接用集中质量 Δu = r/m_L
//! 4. FCT: 低阶增量、反扩散贡献、包络交换 (Min/Max)、
//!    P± 交换 (Add)、限制叠加
//! 5. 边界条件以增量形式施加: Dirichlet 覆写、对称投影、
//!    远场按马赫数分类覆写、出口背压覆写、驻点区动量清零
//! 6. 提交 u ← u + Δu
//!
//! 任何致命错误经 `run` 广播中止，全体分区在下一个通信点退出。

use std::collections::BTreeMap;

use glam::DVec3;
use tf_foundation::{TfError, TfResult};
use tf_mesh::{DerivedConnectivity, MeshChunk};
use tf_runtime::{Communicator, MergeOp, ReduceOp, Tag};

use crate::boundary::{farfield_state, subsonic_outlet_state, symmetry_project, BcKind, BcTable};
use crate::fct::FluxCorrector;
use crate::fields::Fields;
use crate::linear_algebra::{self, CgConfig, CsrMatrix};
use crate::pde::PdeSystem;
use crate::reconstruction;
use crate::types::{FlowConfig, SchemeKind};

/// 一步推进的结果
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub step: u64,
    pub t: f64,
    pub dt: f64,
    /// 增量的全局 L2 范数（收敛/停滞监控）
    pub du_norm: f64,
}

/// 点格式分区推进器
pub struct NodeStepper {
    chunk: MeshChunk,
    derived: DerivedConnectivity,
    pde: PdeSystem,
    cfg: FlowConfig,
    bc: BcTable,
    fct: Option<FluxCorrector>,
    /// 一致质量阵（本分区部分装配）
    mass: CsrMatrix,
    /// 集中质量 = 节点控制体积（跨分区合并后）
    ml: Vec<f64>,
    /// Dirichlet 节点掩码
    dirichlet: Vec<bool>,
    u: Fields,
    t: f64,
    step: u64,
}

impl NodeStepper {
    pub fn new(
        chunk: MeshChunk,
        pde: PdeSystem,
        cfg: FlowConfig,
        bc: BcTable,
    ) -> TfResult<Self> {
        if !pde.is_nodal() {
            return Err(TfError::config("点格式推进器只接受节点为中心的方程体系"));
        }
        if cfg.scheme == SchemeKind::EdgeMuscl && !matches!(pde, PdeSystem::CompFlow(_)) {
            return Err(TfError::config("边格式只支持单材料可压缩流"));
        }
        cfg.validate()?;
        if bc.iter().any(|(_, k)| k == BcKind::Farfield) && cfg.farfield.is_none() {
            return Err(TfError::config("远场边界条件需要配置远场状态"));
        }
        if bc.iter().any(|(_, k)| k == BcKind::SubsonicOutlet) && cfg.outlet_pressure.is_none() {
            return Err(TfError::config("亚音速出口边界条件需要配置背压"));
        }
        let derived = DerivedConnectivity::build(&chunk.mesh, &chunk.gid)?;
        let ncomp = pde.ncomp();

        // 一致质量阵: 对角 J/60, 非对角 J/120
        let mut mass = CsrMatrix::from_psup(&derived.psup);
        for e in 0..chunk.mesh.nelem() {
            let geo = chunk.mesh.element_geometry(e)?;
            let nodes = chunk.mesh.inpoel[e];
            for a in 0..4 {
                for b in 0..4 {
                    let m = if a == b {
                        geo.jacobian / 60.0
                    } else {
                        geo.jacobian / 120.0
                    };
                    mass.add(nodes[a], nodes[b], m)?;
                }
            }
        }

        let mut dirichlet = vec![false; chunk.mesh.nnode()];
        for (sideset, kind) in bc.iter() {
            if kind == BcKind::Dirichlet {
                if let Some(nodes) = derived.sideset_nodes.get(&sideset) {
                    for &p in nodes {
                        dirichlet[p] = true;
                    }
                }
            }
        }

        let fct = cfg
            .fct
            .then(|| {
                let f = FluxCorrector::new(ncomp, cfg.ctau);
                // 可压缩流整组守恒量按同一系数限制
                if matches!(pde, PdeSystem::CompFlow(_)) {
                    f.with_system((0..ncomp).collect())
                } else {
                    f
                }
            });

        let ml = derived.nodal_volume.clone();
        let u = Fields::new(chunk.mesh.nnode(), ncomp);
        Ok(Self {
            chunk,
            derived,
            pde,
            cfg,
            bc,
            fct,
            mass,
            ml,
            dirichlet,
            u,
            t: 0.0,
            step: 0,
        })
    }

    /// 初始条件 + 集中质量的跨分区合并
    pub fn initialize(&mut self, comm: &mut Communicator) -> TfResult<()> {
        self.pde.initialize(&self.chunk.mesh, self.t, &mut self.u)?;
        combine_vec(
            &mut self.ml,
            1,
            &self.chunk,
            comm,
            MergeOp::Add,
            "init-ml",
            0,
        )?;
        Ok(())
    }

    pub fn solution(&self) -> &Fields {
        &self.u
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn chunk(&self) -> &MeshChunk {
        &self.chunk
    }

    /// 推进一步
    pub fn step(&mut self, comm: &mut Communicator) -> TfResult<StepReport> {
        if let Some(err) = comm.aborted() {
            return Err(err);
        }
        let ncomp = self.pde.ncomp();
        let nnode = self.chunk.mesh.nnode();
        let round = self.step;

        // 全局时间步长
        let dt = match self.cfg.dt_fixed {
            Some(fixed) => fixed,
            None => {
                let local = self.pde.dt(&self.chunk.mesh, self.t, &self.u, self.cfg.cfl)?;
                comm.allreduce(Tag::new("dt", round), &[local], ReduceOp::Min)?[0]
            }
        };

        // 残差装配 + 边界部分和交换
        let mut r = Fields::new(nnode, ncomp);
        self.assemble(dt, comm, round, &mut r)?;
        combine_fields(&mut r, &self.chunk, comm, MergeOp::Add, "rhs", round)?;

        // 增量
        let mut du = if let Some(fct) = &self.fct {
            self.fct_increment(fct, dt, &r, comm, round)?
        } else {
            let mut du = Fields::new(nnode, ncomp);
            for p in 0..nnode {
                for c in 0..ncomp {
                    du.set(p, c, r.get(p, c) / self.ml[p]);
                }
            }
            self.apply_dirichlet(dt, &mut du);
            du
        };

        // 对称/远场/出口边界与驻点
        self.apply_symmetry(&mut du);
        self.apply_farfield(&mut du);
        self.apply_outlet(&mut du);
        self.apply_stagnation(&mut du);

        // 提交
        self.u.axpy(1.0, &du)?;
        self.t += dt;
        self.step += 1;

        // 增量范数（全局, 去重）
        let mut local = 0.0;
        for p in 0..nnode {
            if self.chunk.owned[p] {
                for c in 0..ncomp {
                    local += du.get(p, c) * du.get(p, c);
                }
            }
        }
        let du_norm = comm
            .allreduce(Tag::new("du-norm", round), &[local], ReduceOp::Sum)?[0]
            .sqrt();
        Ok(StepReport {
            step: self.step,
            t: self.t,
            dt,
            du_norm,
        })
    }

    /// 推进 `nsteps` 步；致命错误广播中止
    pub fn run(&mut self, comm: &mut Communicator, nsteps: u64) -> TfResult<StepReport> {
        let mut last = StepReport {
            step: self.step,
            t: self.t,
            dt: 0.0,
            du_norm: 0.0,
        };
        for _ in 0..nsteps {
            match self.step(comm) {
                Ok(report) => {
                    tracing::debug!(
                        step = report.step,
                        t = report.t,
                        dt = report.dt,
                        du_norm = report.du_norm,
                        "推进一步完成"
                    );
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

    fn assemble(
        &self,
        dt: f64,
        comm: &mut Communicator,
        round: u64,
        r: &mut Fields,
    ) -> TfResult<()> {
        match (&self.pde, self.cfg.scheme) {
            (PdeSystem::Transport(tr), _) => tr.rhs(&self.chunk.mesh, self.t, dt, &self.u, r),
            (PdeSystem::CompFlow(cf), SchemeKind::TwoStage) => {
                cf.rhs_twostage(&self.chunk.mesh, self.t, dt, &self.u, r)
            }
            (PdeSystem::CompFlow(cf), SchemeKind::EdgeMuscl) => {
                // 节点梯度: 部分和交换后除以合并过的节点体积
                let mut grad = reconstruction::nodal_gradients_partial(&self.chunk.mesh, &self.u)?;
                combine_gradients(&mut grad, &self.chunk, comm, round)?;
                for (p, g) in grad.iter_mut().enumerate() {
                    for gc in g.iter_mut() {
                        *gc /= self.ml[p];
                    }
                }
                cf.rhs_edge(&self.chunk.mesh, &self.derived, dt, &self.u, &grad, r)
            }
            (PdeSystem::MultiMat(_), _) => Err(TfError::config("单元格式体系不走点格式装配")),
        }
    }

    /// FCT 限制增量: 高阶 CG 解 + 低阶质量扩散解 + 反扩散限制
    fn fct_increment(
        &self,
        fct: &FluxCorrector,
        dt: f64,
        r: &Fields,
        comm: &mut Communicator,
        round: u64,
    ) -> TfResult<Fields> {
        let ncomp = self.pde.ncomp();
        let nnode = self.chunk.mesh.nnode();

        // 低阶: Δu^L = (r + D)/m_L
        let mut d = Fields::new(nnode, ncomp);
        fct.mass_diffusion(&self.chunk.mesh, &self.u, &mut d)?;
        combine_fields(&mut d, &self.chunk, comm, MergeOp::Add, "fct-diff", round)?;
        let mut dul = Fields::new(nnode, ncomp);
        for p in 0..nnode {
            for c in 0..ncomp {
                dul.set(p, c, (r.get(p, c) + d.get(p, c)) / self.ml[p]);
            }
        }

        // 高阶: M_c·Δu^H = r, 每分量一次分布式共轭梯度
        let mut duh = Fields::new(nnode, ncomp);
        let cg_cfg = CgConfig::default();
        for c in 0..ncomp {
            let b: Vec<f64> = (0..nnode).map(|p| r.get(p, c)).collect();
            let mut x: Vec<f64> = (0..nnode).map(|p| dul.get(p, c)).collect();
            let solve_round = round * ncomp as u64 + c as u64;
            linear_algebra::solve(&self.mass, &b, &mut x, &self.chunk, comm, solve_round, &cg_cfg)?;
            for p in 0..nnode {
                duh.set(p, c, x[p]);
            }
        }

        // Dirichlet 增量在限制之前覆写, 掩码保证反扩散不再触碰
        self.apply_dirichlet(dt, &mut dul);
        self.apply_dirichlet(dt, &mut duh);

        let mut aec = Fields::new(4 * self.chunk.mesh.nelem(), ncomp);
        fct.aec(&self.chunk.mesh, &self.ml, &self.u, &duh, &self.dirichlet, &mut aec)?;

        let mut ul = self.u.clone();
        ul.axpy(1.0, &dul)?;
        let mut qmin = Fields::new(nnode, ncomp);
        let mut qmax = Fields::new(nnode, ncomp);
        fct.allowed_bounds(&self.chunk.mesh, &self.u, &ul, &mut qmin, &mut qmax);
        combine_fields(&mut qmin, &self.chunk, comm, MergeOp::Min, "fct-qmin", round)?;
        combine_fields(&mut qmax, &self.chunk, comm, MergeOp::Max, "fct-qmax", round)?;

        let mut p = Fields::new(nnode, 2 * ncomp);
        fct.sums(&self.chunk.mesh, &aec, &mut p);
        combine_fields(&mut p, &self.chunk, comm, MergeOp::Add, "fct-sums", round)?;

        let mut du = dul.clone();
        fct.limit(&self.chunk.mesh, &aec, &ul, &p, &qmin, &qmax, &mut du);
        Ok(du)
    }

    /// Dirichlet 增量: Δu = 解析解(t+dt) - 解析解(t)
    fn apply_dirichlet(&self, dt: f64, du: &mut Fields) {
        for (p, &mask) in self.dirichlet.iter().enumerate() {
            if !mask {
                continue;
            }
            let x = self.chunk.mesh.coord[p];
            let inc: Vec<f64> = match &self.pde {
                PdeSystem::Transport(tr) => {
                    let now = tr.problem().solution(x, self.t);
                    let next = tr.problem().solution(x, self.t + dt);
                    next.iter().zip(&now).map(|(n, o)| n - o).collect()
                }
                PdeSystem::CompFlow(cf) => {
                    let m = *cf.material();
                    let now = cf.problem().solution(x, self.t, &m);
                    let next = cf.problem().solution(x, self.t + dt, &m);
                    next.iter().zip(&now).map(|(n, o)| n - o).collect()
                }
                PdeSystem::MultiMat(_) => continue,
            };
            du.row_mut(p).copy_from_slice(&inc);
        }
    }

    /// 对称边界: 动量增量投影掉法向分量
    fn apply_symmetry(&self, du: &mut Fields) {
        let PdeSystem::CompFlow(_) = &self.pde else {
            return;
        };
        for (sideset, kind) in self.bc.iter() {
            if kind != BcKind::Symmetry {
                continue;
            }
            let Some(nodes) = self.derived.sideset_nodes.get(&sideset) else {
                continue;
            };
            for &p in nodes {
                let Some(&n) = self.derived.boundary_normal.get(&(sideset, p)) else {
                    continue;
                };
                let m = DVec3::new(du.get(p, 1), du.get(p, 2), du.get(p, 3));
                let proj = symmetry_project(m, n);
                for i in 0..3 {
                    du.set(p, 1 + i, proj[i]);
                }
            }
        }
    }

    /// 远场边界: 按马赫数分类后直接覆写为目标状态的增量
    fn apply_farfield(&self, du: &mut Fields) {
        let PdeSystem::CompFlow(cf) = &self.pde else {
            return;
        };
        let Some(far) = &self.cfg.farfield else {
            return;
        };
        for (sideset, kind) in self.bc.iter() {
            if kind != BcKind::Farfield {
                continue;
            }
            let Some(nodes) = self.derived.sideset_nodes.get(&sideset) else {
                continue;
            };
            for &p in nodes {
                let Some(&n) = self.derived.boundary_normal.get(&(sideset, p)) else {
                    continue;
                };
                let target = farfield_state(self.u.row(p), n, far, cf.material());
                for c in 0..5 {
                    du.set(p, c, target[c] - self.u.get(p, c));
                }
            }
        }
    }

    /// 亚音速出口: 密度/动量外推, 能量按背压覆写
    fn apply_outlet(&self, du: &mut Fields) {
        let PdeSystem::CompFlow(cf) = &self.pde else {
            return;
        };
        let Some(p_out) = self.cfg.outlet_pressure else {
            return;
        };
        for (sideset, kind) in self.bc.iter() {
            if kind != BcKind::SubsonicOutlet {
                continue;
            }
            let Some(nodes) = self.derived.sideset_nodes.get(&sideset) else {
                continue;
            };
            for &p in nodes {
                let target = subsonic_outlet_state(self.u.row(p), p_out, cf.material());
                for c in 0..5 {
                    du.set(p, c, target[c] - self.u.get(p, c));
                }
            }
        }
    }

    /// 驻点区域: 区域内节点的动量增量覆写为清零增量
    fn apply_stagnation(&self, du: &mut Fields) {
        let PdeSystem::CompFlow(_) = &self.pde else {
            return;
        };
        if self.cfg.stagnation.is_empty() {
            return;
        }
        for (p, &x) in self.chunk.mesh.coord.iter().enumerate() {
            let held = self
                .cfg
                .stagnation
                .iter()
                .any(|z| x.distance_squared(z.center) <= z.radius * z.radius);
            if held {
                for c in 1..4 {
                    du.set(p, c, -self.u.get(p, c));
                }
            }
        }
    }
}

// ============================================================================
// 分区边界交换辅助
// ============================================================================

/// Fields 的共享节点行交换
fn combine_fields(
    f: &mut Fields,
    chunk: &MeshChunk,
    comm: &mut Communicator,
    op: MergeOp,
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
            .map(|&g| (g, f.row(chunk.lid[&g]).to_vec()))
            .collect();
        outgoing.insert(peer, entries);
    }
    let peers: Vec<usize> = chunk.node_comm.keys().copied().collect();
    let merged = comm.exchange(Tag::new(stage, round), &outgoing, &peers, op)?;
    for (g, vals) in merged {
        let l = chunk.lid[&g];
        let mut row = f.row(l).to_vec();
        op.apply(&mut row, &vals);
        f.row_mut(l).copy_from_slice(&row);
    }
    Ok(())
}

/// 平铺标量数组（每节点 `width` 个值）的共享节点交换
fn combine_vec(
    v: &mut [f64],
    width: usize,
    chunk: &MeshChunk,
    comm: &mut Communicator,
    op: MergeOp,
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
            .map(|&g| {
                let l = chunk.lid[&g];
                (g, v[l * width..(l + 1) * width].to_vec())
            })
            .collect();
        outgoing.insert(peer, entries);
    }
    let peers: Vec<usize> = chunk.node_comm.keys().copied().collect();
    let merged = comm.exchange(Tag::new(stage, round), &outgoing, &peers, op)?;
    for (g, vals) in merged {
        let l = chunk.lid[&g];
        op.apply(&mut v[l * width..(l + 1) * width], &vals);
    }
    Ok(())
}

/// 节点梯度（每节点 ncomp 个向量）的共享节点部分和交换
fn combine_gradients(
    grad: &mut [Vec<DVec3>],
    chunk: &MeshChunk,
    comm: &mut Communicator,
    round: u64,
) -> TfResult<()> {
    if chunk.node_comm.is_empty() {
        return Ok(());
    }
    let ncomp = grad.first().map_or(0, Vec::len);
    let mut flat: Vec<f64> = Vec::with_capacity(grad.len() * ncomp * 3);
    for g in grad.iter() {
        for v in g {
            flat.extend_from_slice(&[v.x, v.y, v.z]);
        }
    }
    combine_vec(&mut flat, ncomp * 3, chunk, comm, MergeOp::Add, "grad", round)?;
    for (p, g) in grad.iter_mut().enumerate() {
        for (c, v) in g.iter_mut().enumerate() {
            let k = (p * ncomp + c) * 3;
            *v = DVec3::new(flat[k], flat[k + 1], flat[k + 2]);
        }
    }
    Ok(())
}
