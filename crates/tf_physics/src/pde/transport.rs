// crates/tf_physics/src/pde/transport.rs

//! 标量输运的点格式残差装配
//!
//! 两阶段单元-节点残差（Lax-Wendroff 半步预测）：
//! 1. 聚合: 节点值取到单元, 按半时间步的通量散度推进得到
//!    单元中心的预测态 ue
//! 2. 散布: 用 ue 处的通量对四个节点做加权散布,
//!    权重 dt·J/6·∇N_a
//! 另加边界三角形上的通量积分（线性通量的精确凑整
//! A/12·(2F_a+F_b+F_c)·n）。
//!
//! 残差表示增量 Δu 的右端项, 分区边界节点的值是部分和,
//! 推进器负责跨分区合并。

use glam::DVec3;
use tf_foundation::TfResult;
use tf_mesh::{geometry, TetMesh};

use crate::fields::Fields;
use crate::problems::TransportProblem;

/// 标量输运方程组
pub struct Transport {
    problem: Box<dyn TransportProblem>,
}

impl Transport {
    pub fn new(problem: Box<dyn TransportProblem>) -> Self {
        Self { problem }
    }

    pub fn ncomp(&self) -> usize {
        self.problem.ncomp()
    }

    pub fn problem(&self) -> &dyn TransportProblem {
        self.problem.as_ref()
    }

    /// 用解析解写初始条件
    pub fn initialize(&self, mesh: &TetMesh, t: f64, u: &mut Fields) {
        for p in 0..mesh.nnode() {
            let sol = self.problem.solution(mesh.coord[p], t);
            u.row_mut(p).copy_from_slice(&sol);
        }
    }

    /// 两阶段残差
    pub fn rhs(
        &self,
        mesh: &TetMesh,
        t: f64,
        dt: f64,
        u: &Fields,
        r: &mut Fields,
    ) -> TfResult<()> {
        let ncomp = self.ncomp();
        r.fill_zero();

        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let nodes = mesh.inpoel[e];

            // 阶段 1: 半步预测 ue = ū - (dt/2)·Σ_a (∇N_a·v_a)·u_a
            let mut ue = vec![0.0; ncomp];
            for a in 0..4 {
                for c in 0..ncomp {
                    ue[c] += 0.25 * u.get(nodes[a], c);
                }
            }
            let half = 0.5 * dt;
            for a in 0..4 {
                let va = self.problem.velocity(mesh.coord[nodes[a]], t);
                let gv = geo.grad[a].dot(va);
                for c in 0..ncomp {
                    ue[c] -= half * gv * u.get(nodes[a], c);
                }
            }

            // 阶段 2: 散布 R_a += dt·V·(∇N_a·v)·ue
            let centroid = mesh.element_centroid(e);
            let vc = self.problem.velocity(centroid, t + half);
            let d = dt * geo.jacobian / 6.0;
            for a in 0..4 {
                let gv = geo.grad[a].dot(vc);
                for c in 0..ncomp {
                    r.add(nodes[a], c, d * gv * ue[c]);
                }
            }
        }

        // 边界积分: R_a -= dt·∮N_a F·n
        self.boundary_integral(mesh, t, dt, u, r);
        Ok(())
    }

    fn boundary_integral(&self, mesh: &TetMesh, t: f64, dt: f64, u: &Fields, r: &mut Fields) {
        let ncomp = self.ncomp();
        for tri in &mesh.btri {
            let [a, b, c] = tri.nodes;
            let (xa, xb, xc) = (mesh.coord[a], mesh.coord[b], mesh.coord[c]);
            let area = geometry::triangle_area(xa, xb, xc);
            let Some(n) = geometry::triangle_normal(xa, xb, xc) else {
                continue;
            };
            // 每个角点的法向通量 F·n = (v·n)·u
            let vn: [f64; 3] = [
                self.problem.velocity(xa, t).dot(n),
                self.problem.velocity(xb, t).dot(n),
                self.problem.velocity(xc, t).dot(n),
            ];
            let w = dt * area / 12.0;
            for comp in 0..ncomp {
                let f = [
                    vn[0] * u.get(a, comp),
                    vn[1] * u.get(b, comp),
                    vn[2] * u.get(c, comp),
                ];
                r.add(a, comp, -w * (2.0 * f[0] + f[1] + f[2]));
                r.add(b, comp, -w * (f[0] + 2.0 * f[1] + f[2]));
                r.add(c, comp, -w * (f[0] + f[1] + 2.0 * f[2]));
            }
        }
    }

    /// CFL 时间步长: min_e cbrt(V)/max|v|
    pub fn dt(&self, mesh: &TetMesh, t: f64, cfl: f64) -> TfResult<f64> {
        let mut mindt = f64::MAX;
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let l = (geo.jacobian / 6.0).cbrt();
            let vmax = mesh.inpoel[e]
                .iter()
                .map(|&p| self.problem.velocity(mesh.coord[p], t).length())
                .fold(0.0f64, f64::max);
            if vmax > 1.0e-12 {
                mindt = mindt.min(l / vmax);
            }
        }
        Ok(cfl * mindt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::GaussianHump;
    use tf_mesh::DerivedConnectivity;

    fn solver() -> Transport {
        Transport::new(Box::new(GaussianHump {
            center: DVec3::splat(0.5),
            width: 0.15,
            velocity: DVec3::new(1.0, 0.0, 0.0),
        }))
    }

    #[test]
    fn test_uniform_state_interior_rhs_zero() {
        // 常数场 + 常速度: 内部节点残差必须为零（控制体封闭）
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let tr = solver();
        let mut u = Fields::new(mesh.nnode(), 1);
        for p in 0..mesh.nnode() {
            u.set(p, 0, 3.0);
        }
        let mut r = Fields::new(mesh.nnode(), 1);
        tr.rhs(&mesh, 0.0, 0.01, &u, &mut r).unwrap();
        let center = (1 * 3 + 1) * 3 + 1;
        assert!(r.get(center, 0).abs() < 1e-13, "内部残差 {}", r.get(center, 0));
    }

    #[test]
    fn test_rhs_moves_hump_downstream() {
        // 残差应把峰往下游推: 峰上游一侧增量为负, 下游为正
        let mesh = TetMesh::box_mesh(4, 4, 4, 1.0, 1.0, 1.0).unwrap();
        let gid: Vec<usize> = (0..mesh.nnode()).collect();
        let derived = DerivedConnectivity::build(&mesh, &gid).unwrap();
        let tr = solver();
        let mut u = Fields::new(mesh.nnode(), 1);
        tr.initialize(&mesh, 0.0, &mut u);
        let mut r = Fields::new(mesh.nnode(), 1);
        let dt = tr.dt(&mesh, 0.0, 0.5).unwrap();
        tr.rhs(&mesh, 0.0, dt, &u, &mut r).unwrap();
        // 峰中心在 (0.5,0.5,0.5); 取下游邻点 (0.75,0.5,0.5) 与上游 (0.25,0.5,0.5)
        let node = |i: usize, j: usize, k: usize| (k * 5 + j) * 5 + i;
        let down = r.get(node(3, 2, 2), 0) / derived.nodal_volume[node(3, 2, 2)];
        let up = r.get(node(1, 2, 2), 0) / derived.nodal_volume[node(1, 2, 2)];
        assert!(down > 0.0, "下游增量 {down} 应为正");
        assert!(up < 0.0, "上游增量 {up} 应为负");
    }

    #[test]
    fn test_dt_scales_with_cfl() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let tr = solver();
        let d1 = tr.dt(&mesh, 0.0, 0.25).unwrap();
        let d2 = tr.dt(&mesh, 0.0, 0.5).unwrap();
        assert!((d2 - 2.0 * d1).abs() < 1e-14);
    }
}
