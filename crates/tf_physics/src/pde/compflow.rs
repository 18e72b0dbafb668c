// crates/tf_physics/src/pde/compflow.rs

//! 单材料可压缩流残差装配
//!
//! 两条路径：
//! - `rhs_twostage`: 点格式两阶段残差（Lax-Wendroff 半步预测 +
//!   单元到节点散布），配 FCT 使用
//! - `rhs_edge`: 边格式残差（节点梯度 + MUSCL 重构 + Rusanov 通量
//!   沿对偶面积分），每条规范边按全局编号定向恰好访问一次，
//!   两端以相反符号收残差——所有共享该边的分区必须得到同一方向
//!
//! 另含盒形能量沉积源（能量锋面沿 z 半正弦释放）与
//! 带锋面速度下限的 CFL 时间步长。

use glam::DVec3;
use rayon::prelude::*;
use tf_foundation::{TfError, TfResult};
use tf_mesh::{geometry, DerivedConnectivity, TetMesh};

use crate::eos::Material;
use crate::fields::Fields;
use crate::problems::CompFlowProblem;
use crate::reconstruction;
use crate::riemann::{RiemannFlux, RusanovCompFlow};
use crate::types::BoxIc;

/// 守恒分量数 [ρ, ρu, ρv, ρw, ρE]
pub const NCOMP: usize = 5;

/// MUSCL 正性保护分量: 密度与总能
const GUARD: [usize; 2] = [0, 4];

/// 单材料可压缩流方程组
pub struct CompFlow {
    material: Material,
    problem: Box<dyn CompFlowProblem>,
    box_ic: Option<BoxIc>,
    riemann: RusanovCompFlow,
}

impl CompFlow {
    pub fn new(
        material: Material,
        problem: Box<dyn CompFlowProblem>,
        box_ic: Option<BoxIc>,
    ) -> Self {
        Self {
            material,
            problem,
            box_ic,
            riemann: RusanovCompFlow::new(material),
        }
    }

    pub fn ncomp(&self) -> usize {
        NCOMP
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn problem(&self) -> &dyn CompFlowProblem {
        self.problem.as_ref()
    }

    /// 用解析解写初始条件
    pub fn initialize(&self, mesh: &TetMesh, t: f64, u: &mut Fields) {
        for p in 0..mesh.nnode() {
            let sol = self.problem.solution(mesh.coord[p], t, &self.material);
            u.row_mut(p).copy_from_slice(&sol);
        }
    }

    /// 一个状态的压力
    #[inline]
    fn pressure(&self, s: &[f64]) -> f64 {
        let rho = s[0];
        self.material
            .pressure(rho, s[1] / rho, s[2] / rho, s[3] / rho, s[4], 1.0)
    }

    /// 方向 j 的物理通量
    #[inline]
    fn flux_dir(s: &[f64], p: f64, j: usize) -> [f64; NCOMP] {
        let vj = s[1 + j] / s[0];
        let mut f = [s[0] * vj, s[1] * vj, s[2] * vj, s[3] * vj, (s[4] + p) * vj];
        f[1 + j] += p;
        f
    }

    // ========================================================================
    // 两阶段点格式
    // ========================================================================

    /// 两阶段残差（增量右端项, 含 dt 缩放）
    pub fn rhs_twostage(
        &self,
        mesh: &TetMesh,
        t: f64,
        dt: f64,
        u: &Fields,
        r: &mut Fields,
    ) -> TfResult<()> {
        r.fill_zero();
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let nodes = mesh.inpoel[e];

            // 阶段 1: 半步预测
            let mut ue = [0.0; NCOMP];
            for a in 0..4 {
                for c in 0..NCOMP {
                    ue[c] += 0.25 * u.get(nodes[a], c);
                }
            }
            let half = 0.5 * dt;
            for a in 0..4 {
                let s = u.row(nodes[a]);
                let p = self.pressure(s);
                for j in 0..3 {
                    let f = Self::flux_dir(s, p, j);
                    for c in 0..NCOMP {
                        ue[c] -= half * geo.grad[a][j] * f[c];
                    }
                }
            }
            // 半步源项
            if let Some(src) = self.box_src(mesh.element_centroid(e), t) {
                ue[4] += half * src;
            }

            // 阶段 2: 散布
            let pe = self.pressure(&ue);
            let d = dt * geo.jacobian / 6.0;
            for a in 0..4 {
                for j in 0..3 {
                    let f = Self::flux_dir(&ue, pe, j);
                    for c in 0..NCOMP {
                        r.add(nodes[a], c, d * geo.grad[a][j] * f[c]);
                    }
                }
            }
            // 源项散布到节点 (每节点 V/4)
            if let Some(src) = self.box_src(mesh.element_centroid(e), t + half) {
                let dv = dt * geo.jacobian / 24.0;
                for &n in &nodes {
                    r.add(n, 4, dv * src);
                }
            }
        }
        self.boundary_integral(mesh, dt, u, r);
        Ok(())
    }

    // ========================================================================
    // 边格式 (MUSCL + Riemann)
    // ========================================================================

    /// 边格式残差
    ///
    /// `grad` 为各分量的节点梯度（分布式场景下必须是合并后的
    /// 完整梯度）。残差含 dt 缩放, 边界积分用节点状态的通量凑整。
    pub fn rhs_edge(
        &self,
        mesh: &TetMesh,
        derived: &DerivedConnectivity,
        dt: f64,
        u: &Fields,
        grad: &[Vec<DVec3>],
        r: &mut Fields,
    ) -> TfResult<()> {
        if grad.len() != mesh.nnode() {
            return Err(TfError::SizeMismatch {
                name: "节点梯度",
                expected: mesh.nnode(),
                actual: grad.len(),
            });
        }
        r.fill_zero();

        for (eid, edge) in derived.edges.iter().enumerate() {
            let [p, q] = *edge;
            let dfn = derived.dual_normal[eid];
            let area = dfn.length();
            if area <= f64::EPSILON {
                continue;
            }
            let n = dfn / area;

            // MUSCL 重构到边中点
            let mut ls = [0.0; NCOMP];
            let mut rs = [0.0; NCOMP];
            ls.copy_from_slice(u.row(p));
            rs.copy_from_slice(u.row(q));
            let edge_vec = mesh.coord[q] - mesh.coord[p];
            reconstruction::muscl(&mut ls, &mut rs, &grad[p], &grad[q], edge_vec, &GUARD);

            let f = self.riemann.flux(n, &ls, &rs);
            for c in 0..NCOMP {
                let dflux = dt * area * f.flux[c];
                // 规范方向上游端 -, 下游端 +
                r.add(p, c, -2.0 * dflux);
                r.add(q, c, 2.0 * dflux);
            }
        }

        self.boundary_integral(mesh, dt, u, r);
        Ok(())
    }

    /// 边界三角形上的通量积分 R_a -= dt·∮N_a F·n
    fn boundary_integral(&self, mesh: &TetMesh, dt: f64, u: &Fields, r: &mut Fields) {
        for tri in &mesh.btri {
            let [a, b, c] = tri.nodes;
            let (xa, xb, xc) = (mesh.coord[a], mesh.coord[b], mesh.coord[c]);
            let area = geometry::triangle_area(xa, xb, xc);
            let Some(n) = geometry::triangle_normal(xa, xb, xc) else {
                continue;
            };
            let mut f = [[0.0; NCOMP]; 3];
            for (i, &node) in tri.nodes.iter().enumerate() {
                let s = u.row(node);
                let p = self.pressure(s);
                for j in 0..3 {
                    let fj = Self::flux_dir(s, p, j);
                    for comp in 0..NCOMP {
                        f[i][comp] += fj[comp] * n[j];
                    }
                }
            }
            let w = dt * area / 12.0;
            for comp in 0..NCOMP {
                r.add(a, comp, -w * (2.0 * f[0][comp] + f[1][comp] + f[2][comp]));
                r.add(b, comp, -w * (f[0][comp] + 2.0 * f[1][comp] + f[2][comp]));
                r.add(c, comp, -w * (f[0][comp] + f[1][comp] + 2.0 * f[2][comp]));
            }
        }
    }

    // ========================================================================
    // 源项与时间步长
    // ========================================================================

    /// 盒内能量沉积功率密度
    ///
    /// 能量锋面 z_f = zmin + 锋速·t, 锋面后方 front_width 范围内
    /// 按半正弦释放; 对时间积分后每单位体积恰好获得 e_c/V_box。
    fn box_src(&self, x: DVec3, t: f64) -> Option<f64> {
        let b = self.box_ic.as_ref()?;
        let ec = b.energy_content?;
        if !b.contains(x) {
            return None;
        }
        let zf = b.bounds[4] + b.front_speed * t;
        let s = zf - x.z;
        if s <= 0.0 || s >= b.front_width {
            return None;
        }
        let q = ec / b.volume() * b.front_speed * std::f64::consts::PI
            / (2.0 * b.front_width)
            * (std::f64::consts::PI * s / b.front_width).sin();
        Some(q)
    }

    /// CFL 时间步长, 带能量锋面速度下限
    pub fn dt(&self, mesh: &TetMesh, u: &Fields, cfl: f64) -> TfResult<f64> {
        let front_speed = self
            .box_ic
            .as_ref()
            .map(|b| b.front_speed)
            .unwrap_or(0.0);
        let mindt = (0..mesh.nelem())
            .into_par_iter()
            .map(|e| -> TfResult<f64> {
                let geo = mesh.element_geometry(e)?;
                let l = (geo.jacobian / 6.0).cbrt();
                let mut vmax = front_speed;
                for &p in &mesh.inpoel[e] {
                    let s = u.row(p);
                    let rho = s[0];
                    let vel = (s[1] * s[1] + s[2] * s[2] + s[3] * s[3]).sqrt() / rho;
                    let pr = self.pressure(s);
                    let a = self.material.soundspeed(rho, pr.max(0.0), 1.0);
                    vmax = vmax.max(vel + a);
                }
                Ok(l / vmax)
            })
            .try_reduce(|| f64::MAX, |a, b| Ok(a.min(b)))?;
        Ok(cfl * mindt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::{SodShocktube, UniformFlow};

    fn uniform_solver(vel: DVec3) -> CompFlow {
        CompFlow::new(
            Material::ideal_gas(1.4),
            Box::new(UniformFlow {
                density: 1.0,
                pressure: 1.0,
                velocity: vel,
            }),
            None,
        )
    }

    #[test]
    fn test_twostage_uniform_interior_zero() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let cf = uniform_solver(DVec3::new(0.3, 0.1, -0.2));
        let mut u = Fields::new(mesh.nnode(), NCOMP);
        cf.initialize(&mesh, 0.0, &mut u);
        let mut r = Fields::new(mesh.nnode(), NCOMP);
        cf.rhs_twostage(&mesh, 0.0, 1.0e-3, &u, &mut r).unwrap();
        let center = (1 * 3 + 1) * 3 + 1;
        for c in 0..NCOMP {
            assert!(
                r.get(center, c).abs() < 1e-11,
                "分量 {c} 内部残差 {}",
                r.get(center, c)
            );
        }
    }

    #[test]
    fn test_edge_uniform_interior_zero() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let gid: Vec<usize> = (0..mesh.nnode()).collect();
        let derived = DerivedConnectivity::build(&mesh, &gid).unwrap();
        let cf = uniform_solver(DVec3::new(0.3, 0.0, 0.0));
        let mut u = Fields::new(mesh.nnode(), NCOMP);
        cf.initialize(&mesh, 0.0, &mut u);
        let grad = reconstruction::nodal_gradients(&mesh, &derived, &u).unwrap();
        let mut r = Fields::new(mesh.nnode(), NCOMP);
        cf.rhs_edge(&mesh, &derived, 1.0e-3, &u, &grad, &mut r).unwrap();
        let center = (1 * 3 + 1) * 3 + 1;
        for c in 0..NCOMP {
            assert!(
                r.get(center, c).abs() < 1e-11,
                "分量 {c} 内部残差 {}",
                r.get(center, c)
            );
        }
    }

    #[test]
    fn test_sod_pressure_gradient_accelerates_flow() {
        // 初始静止 Sod 状态: 界面附近下游节点的 x 动量增量应为正
        let mesh = TetMesh::box_mesh(8, 1, 1, 1.0, 0.125, 0.125).unwrap();
        let gid: Vec<usize> = (0..mesh.nnode()).collect();
        let derived = DerivedConnectivity::build(&mesh, &gid).unwrap();
        let cf = CompFlow::new(Material::ideal_gas(1.4), Box::new(SodShocktube), None);
        let mut u = Fields::new(mesh.nnode(), NCOMP);
        cf.initialize(&mesh, 0.0, &mut u);
        let grad = reconstruction::nodal_gradients(&mesh, &derived, &u).unwrap();
        let mut r = Fields::new(mesh.nnode(), NCOMP);
        let dt = cf.dt(&mesh, &u, 0.5).unwrap();
        cf.rhs_edge(&mesh, &derived, dt, &u, &grad, &mut r).unwrap();
        // 界面跳变位于节点列 i=3/i=4 之间; 取低压一侧第一列 i=4
        let node = (1 * 2 + 1) * 9 + 4;
        assert!(r.get(node, 1) > 0.0, "界面下游动量增量 {}", r.get(node, 1));
    }

    #[test]
    fn test_box_src_time_integral() {
        // 锋面扫过一点后的时间积分能量 = e_c/V_box
        let b = BoxIc {
            bounds: [0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            energy_content: Some(10.0),
            front_speed: 0.08,
            front_width: 0.2,
        };
        let cf = CompFlow::new(
            Material::ideal_gas(1.4),
            Box::new(SodShocktube),
            Some(b),
        );
        let x = DVec3::new(0.5, 0.5, 0.3);
        let tend = (0.3 + 0.2) / 0.08 + 1.0;
        let nstep = 200000;
        let dt = tend / nstep as f64;
        let mut total = 0.0;
        for i in 0..nstep {
            if let Some(q) = cf.box_src(x, i as f64 * dt) {
                total += q * dt;
            }
        }
        assert!((total - 10.0).abs() < 0.01, "积分能量 {total}");
    }

    #[test]
    fn test_dt_honors_front_speed_floor() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let cf = uniform_solver(DVec3::ZERO);
        let mut u = Fields::new(mesh.nnode(), NCOMP);
        cf.initialize(&mesh, 0.0, &mut u);
        let dt_plain = cf.dt(&mesh, &u, 0.5).unwrap();

        let cf_box = CompFlow::new(
            Material::ideal_gas(1.4),
            Box::new(UniformFlow {
                density: 1.0,
                pressure: 1.0,
                velocity: DVec3::ZERO,
            }),
            Some(BoxIc {
                bounds: [0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
                energy_content: Some(1.0),
                front_speed: 100.0,
                front_width: 0.1,
            }),
        );
        let dt_box = cf_box.dt(&mesh, &u, 0.5).unwrap();
        assert!(dt_box < dt_plain, "锋面速度下限未生效");
    }
}
