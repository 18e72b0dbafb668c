// crates/tf_physics/src/pde/multimat.rs

//! 多材料单元格式残差装配
//!
//! 单元为中心的高阶格式（P0/P1），每步的残差由四部分组成：
//! 1. 体积分: 物理通量对基函数梯度的积分（P1 起有效）
//! 2. 面积分: 内部面与边界面上的黎曼通量, 同时按面累计
//!    界面压力 ∮p*_k·n dA 与界面速度散度 ∮v*·n dA 供非守恒项使用
//! 3. 非守恒项: 体积分数方程的 α·∇·v* 源与能量方程的
//!    -v·(Y_k·∮p*·n - ∮p*_k·n) 交换项
//! 4. 压力松弛源: 有限速率模式下把各材料压力拉向加权平衡压力,
//!    时标 t_relax = max_k(ct·dx/a_k)
//!
//! 残差是 du/dt 的弱形式右端（未除质量矩阵、未乘 dt）。

use glam::DVec3;
use tf_foundation::tolerance::ALPHA_FLOOR;
use tf_foundation::TfResult;
use tf_mesh::{FaceConnectivity, TetMesh};

use crate::basis;
use crate::boundary::{BcKind, BcTable};
use crate::eos::Material;
use crate::fields::Fields;
use crate::multimat::{clean_trace_materials, MatLayout};
use crate::problems::MultiMatProblem;
use crate::riemann::{create_multimat_flux, RiemannFlux};
use crate::types::{FluxKind, PrelaxMode};

/// 多材料方程组
pub struct MultiMat {
    layout: MatLayout,
    materials: Vec<Material>,
    problem: Box<dyn MultiMatProblem>,
    riemann: Box<dyn RiemannFlux>,
    prelax: PrelaxMode,
    ndof: usize,
}

impl MultiMat {
    pub fn new(
        materials: Vec<Material>,
        problem: Box<dyn MultiMatProblem>,
        flux: FluxKind,
        prelax: PrelaxMode,
        ndof: usize,
    ) -> Self {
        let layout = MatLayout::new(materials.len());
        let riemann = create_multimat_flux(flux, layout, materials.clone());
        Self {
            layout,
            materials,
            problem,
            riemann,
            prelax,
            ndof,
        }
    }

    pub fn layout(&self) -> &MatLayout {
        &self.layout
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn ncomp(&self) -> usize {
        self.layout.ncomp()
    }

    pub fn ndof(&self) -> usize {
        self.ndof
    }

    /// L2 投影初始条件到单元基
    pub fn initialize(&self, mesh: &TetMesh, t: f64, u: &mut Fields) -> TfResult<()> {
        let ncomp = self.ncomp();
        let q = basis::tet_quadrature(2);
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let origin = mesh.coord[mesh.inpoel[e][0]];
            // dof_i = ∫u·B_i / ∫B_i², 归一化权重下体积约去
            let mass = basis::mass_diag(self.ndof, 1.0);
            let mut dofs = vec![0.0; ncomp * self.ndof];
            for (rp, w) in q.coords.iter().zip(&q.weights) {
                let x = origin + rp[0] * geo.ba + rp[1] * geo.ca + rp[2] * geo.da;
                let sol = self.problem.solution(&self.layout, &self.materials, x, t);
                let b = basis::eval_basis(self.ndof, rp[0], rp[1], rp[2]);
                for c in 0..ncomp {
                    for i in 0..self.ndof {
                        dofs[c * self.ndof + i] += w * sol[c] * b[i] / mass[i];
                    }
                }
            }
            u.row_mut(e).copy_from_slice(&dofs);
        }
        Ok(())
    }

    /// 在单元参考点处重构完整状态
    fn eval_state(&self, u: &Fields, e: usize, b: &[f64]) -> Vec<f64> {
        let ncomp = self.ncomp();
        (0..ncomp)
            .map(|c| {
                let row = u.row(e);
                basis::eval_solution(&row[c * self.ndof..(c + 1) * self.ndof], b)
            })
            .collect()
    }

    /// 单元均值
    fn means(&self, u: &Fields, e: usize) -> Vec<f64> {
        let row = u.row(e);
        (0..self.ncomp()).map(|c| row[c * self.ndof]).collect()
    }

    /// 边界面上的外侧状态
    fn boundary_state(
        &self,
        kind: BcKind,
        inner: &[f64],
        n: DVec3,
        x: DVec3,
        t: f64,
    ) -> Vec<f64> {
        match kind {
            BcKind::Dirichlet => self.problem.solution(&self.layout, &self.materials, x, t),
            BcKind::Symmetry => {
                let mut s = inner.to_vec();
                let l = &self.layout;
                let m = DVec3::new(
                    inner[l.momentum(0)],
                    inner[l.momentum(1)],
                    inner[l.momentum(2)],
                );
                let mirrored = m - 2.0 * m.dot(n) * n;
                for i in 0..3 {
                    s[l.momentum(i)] = mirrored[i];
                }
                s
            }
            // 远场与出口在多材料体系退化为零阶外推
            BcKind::Farfield | BcKind::SubsonicOutlet | BcKind::Extrapolate => inner.to_vec(),
        }
    }

    /// 残差装配
    ///
    /// `riem_deriv` 布局: 每单元 3·nmat+1 个量, 前 3·nmat 为
    /// ∮p*_k·n dA 的三个分量, 末位为 ∮v*·n dA。
    pub fn rhs(
        &self,
        mesh: &TetMesh,
        faces: &FaceConnectivity,
        bc: &BcTable,
        t: f64,
        u: &Fields,
        r: &mut Fields,
    ) -> TfResult<()> {
        let ncomp = self.ncomp();
        let nmat = self.layout.nmat;
        let ndof = self.ndof;
        r.fill_zero();
        let mut riem_deriv = vec![vec![0.0; 3 * nmat + 1]; mesh.nelem()];

        let geos: Vec<_> = (0..mesh.nelem())
            .map(|e| mesh.element_geometry(e))
            .collect::<TfResult<Vec<_>>>()?;

        // ====================================================================
        // 体积分 (P1 起)
        // ====================================================================
        if ndof > 1 {
            let q = basis::tet_quadrature(2);
            for e in 0..mesh.nelem() {
                let geo = &geos[e];
                let vol = geo.jacobian / 6.0;
                let gb = basis::basis_gradients(ndof, geo);
                for (rp, w) in q.coords.iter().zip(&q.weights) {
                    let b = basis::eval_basis(ndof, rp[0], rp[1], rp[2]);
                    let s = self.eval_state(u, e, &b);
                    let f = self.physical_flux(&s);
                    for c in 0..ncomp {
                        for i in 1..ndof {
                            r.add(e, c * ndof + i, w * vol * f[c].dot(gb[i]));
                        }
                    }
                }
            }
        }

        // ====================================================================
        // 内部面积分
        // ====================================================================
        let fq = basis::tri_quadrature(if ndof > 1 { 2 } else { 1 });
        for face in &faces.interior {
            let (xa, xb, xc) = (
                mesh.coord[face.nodes[0]],
                mesh.coord[face.nodes[1]],
                mesh.coord[face.nodes[2]],
            );
            for (bary, w) in fq.coords.iter().zip(&fq.weights) {
                let x = bary[0] * xa + bary[1] * xb + (1.0 - bary[0] - bary[1]) * xc;
                let bl = self.basis_at(mesh, &geos[face.left], face.left, x);
                let br = self.basis_at(mesh, &geos[face.right], face.right, x);
                let sl = self.eval_state(u, face.left, &bl);
                let sr = self.eval_state(u, face.right, &br);
                let f = self.riemann.flux(face.normal, &sl, &sr);
                let wa = w * face.area;
                for c in 0..ncomp {
                    for i in 0..ndof {
                        r.add(face.left, c * ndof + i, -wa * f.flux[c] * bl[i]);
                        r.add(face.right, c * ndof + i, wa * f.flux[c] * br[i]);
                    }
                }
                self.accumulate_riemann_deriv(
                    &mut riem_deriv,
                    face.left,
                    face.right,
                    face.normal,
                    wa,
                    &f.material_pressure,
                    f.interface_velocity,
                );
            }
        }

        // ====================================================================
        // 边界面积分
        // ====================================================================
        for face in &faces.boundary {
            let kind = bc.get(face.sideset).unwrap_or(BcKind::Extrapolate);
            let (xa, xb, xc) = (
                mesh.coord[face.nodes[0]],
                mesh.coord[face.nodes[1]],
                mesh.coord[face.nodes[2]],
            );
            for (bary, w) in fq.coords.iter().zip(&fq.weights) {
                let x = bary[0] * xa + bary[1] * xb + (1.0 - bary[0] - bary[1]) * xc;
                let bl = self.basis_at(mesh, &geos[face.element], face.element, x);
                let sl = self.eval_state(u, face.element, &bl);
                let sr = self.boundary_state(kind, &sl, face.normal, x, t);
                let f = self.riemann.flux(face.normal, &sl, &sr);
                let wa = w * face.area;
                for c in 0..ncomp {
                    for i in 0..ndof {
                        r.add(face.element, c * ndof + i, -wa * f.flux[c] * bl[i]);
                    }
                }
                for k in 0..nmat {
                    for d in 0..3 {
                        riem_deriv[face.element][3 * k + d] +=
                            wa * f.material_pressure[k] * face.normal[d];
                    }
                }
                riem_deriv[face.element][3 * nmat] +=
                    wa * f.interface_velocity.dot(face.normal);
            }
        }

        // ====================================================================
        // 非守恒项与压力松弛源
        // ====================================================================
        for e in 0..mesh.nelem() {
            let vol = geos[e].jacobian / 6.0;
            let means = self.means(u, e);
            let vel = self.layout.velocity(&means);
            let rho = self.layout.bulk_density(&means);
            let divv = riem_deriv[e][3 * nmat];

            // 整体界面压力梯度 Σ_k ∮p*_k α... 的近似
            let mut pbulk = DVec3::ZERO;
            for k in 0..nmat {
                pbulk += means[self.layout.volfrac(k)]
                    * DVec3::new(
                        riem_deriv[e][3 * k],
                        riem_deriv[e][3 * k + 1],
                        riem_deriv[e][3 * k + 2],
                    );
            }

            let mass = basis::mass_diag(ndof, 1.0);
            for k in 0..nmat {
                let alk = means[self.layout.volfrac(k)];
                let ymat = means[self.layout.density(k)] / rho;
                // 体积分数方程: α_k·∇·v* 源, 正交基下逐自由度闭式可得
                for i in 0..ndof {
                    let alk_dof = u.get(e, self.layout.volfrac(k) * ndof + i);
                    r.add(
                        e,
                        self.layout.volfrac(k) * ndof + i,
                        alk_dof * mass[i] * divv,
                    );
                }
                // 能量方程: -v·(Y_k·∮p*·n - α_k∮p*_k·n)
                let pk = alk
                    * DVec3::new(
                        riem_deriv[e][3 * k],
                        riem_deriv[e][3 * k + 1],
                        riem_deriv[e][3 * k + 2],
                    );
                r.add(
                    e,
                    self.layout.energy(k) * ndof,
                    -vel.dot(ymat * pbulk - pk),
                );
            }

            // 有限速率压力松弛
            if let PrelaxMode::FiniteRate { ct } = self.prelax {
                self.pressure_relaxation_src(e, vol, ct, &means, r);
            }
        }
        Ok(())
    }

    /// 有限速率压力松弛源
    ///
    /// p_relax = Σ(α_k·ap_k/κ_k)/Σ(α_k²/κ_k), κ_k = αρ_k·a_k²,
    /// s_α = (ap_k - p_relax·α_k)·(α_k/κ_k)/t_relax,
    /// 体积分数方程 +s_α, 能量方程 -p_bulk·s_α。
    fn pressure_relaxation_src(&self, e: usize, vol: f64, ct: f64, means: &[f64], r: &mut Fields) {
        let l = &self.layout;
        let nmat = l.nmat;
        let dx = vol.cbrt();
        let pb = l.bulk_pressure(means, &self.materials);

        let mut trelax = 0.0f64;
        let mut num = 0.0;
        let mut den = 0.0;
        let mut kappa = vec![0.0; nmat];
        for k in 0..nmat {
            let alk = means[l.volfrac(k)].max(ALPHA_FLOOR);
            let arho = means[l.density(k)].max(ALPHA_FLOOR);
            let apk = l.material_pressure(means, &self.materials, k);
            let a = self.materials[k].soundspeed(arho, apk.max(0.0), alk);
            kappa[k] = (arho * a * a).max(ALPHA_FLOOR);
            trelax = trelax.max(ct * dx / a.max(1.0e-12));
            num += alk * apk / kappa[k];
            den += alk * alk / kappa[k];
        }
        let p_relax = num / den;

        for k in 0..nmat {
            let alk = means[l.volfrac(k)].max(ALPHA_FLOOR);
            let apk = l.material_pressure(means, &self.materials, k);
            let s_alpha = (apk - p_relax * alk) * (alk / kappa[k]) / trelax;
            r.add(e, l.volfrac(k) * self.ndof, vol * s_alpha);
            r.add(e, l.energy(k) * self.ndof, -vol * pb * s_alpha);
        }
    }

    fn accumulate_riemann_deriv(
        &self,
        riem_deriv: &mut [Vec<f64>],
        left: usize,
        right: usize,
        n: DVec3,
        wa: f64,
        material_pressure: &[f64],
        vriem: DVec3,
    ) {
        let nmat = self.layout.nmat;
        for k in 0..nmat {
            for d in 0..3 {
                let c = wa * material_pressure[k] * n[d];
                riem_deriv[left][3 * k + d] += c;
                riem_deriv[right][3 * k + d] -= c;
            }
        }
        let c = wa * vriem.dot(n);
        riem_deriv[left][3 * nmat] += c;
        riem_deriv[right][3 * nmat] -= c;
    }

    /// 物理点处两个单元共享的基函数值
    fn basis_at(
        &self,
        mesh: &TetMesh,
        geo: &tf_mesh::ElementGeometry,
        e: usize,
        x: DVec3,
    ) -> Vec<f64> {
        let origin = mesh.coord[mesh.inpoel[e][0]];
        let rp = basis::physical_to_reference(geo, origin, x);
        basis::eval_basis(self.ndof, rp[0], rp[1], rp[2])
    }

    /// 每分量方向通量 F_c (三个方向打包为向量)
    fn physical_flux(&self, s: &[f64]) -> Vec<DVec3> {
        let l = &self.layout;
        let vel = l.velocity(s);
        let apk: Vec<f64> = (0..l.nmat)
            .map(|k| l.material_pressure(s, &self.materials, k))
            .collect();
        let p: f64 = apk.iter().sum();
        let mut f = vec![DVec3::ZERO; l.ncomp()];
        for k in 0..l.nmat {
            f[l.volfrac(k)] = s[l.volfrac(k)] * vel;
            f[l.density(k)] = s[l.density(k)] * vel;
            f[l.energy(k)] = (s[l.energy(k)] + apk[k]) * vel;
        }
        for i in 0..3 {
            f[l.momentum(i)] = s[l.momentum(i)] * vel + p * DVec3::AXES[i];
        }
        f
    }

    /// CFL 时间步长（按单元均值的最大信号速度）
    pub fn dt(&self, mesh: &TetMesh, u: &Fields, cfl: f64) -> TfResult<f64> {
        let mut mindt = f64::MAX;
        for e in 0..mesh.nelem() {
            let geo = mesh.element_geometry(e)?;
            let l = (geo.jacobian / 6.0).cbrt();
            let means = self.means(u, e);
            let v = self.layout.velocity(&means).length();
            let a = self.layout.max_soundspeed(&means, &self.materials);
            mindt = mindt.min(l / (v + a));
        }
        Ok(cfl * mindt)
    }

    /// 每步收尾: 痕量材料修正 (+ 瞬时压力松弛)
    ///
    /// 只作用于单元均值; P1 时线性自由度保持, 由限制器约束。
    pub fn cleanup(&self, mesh: &TetMesh, u: &mut Fields) -> TfResult<()> {
        let ndof = self.ndof;
        for e in 0..mesh.nelem() {
            let mut means = self.means(u, e);
            if let PrelaxMode::Instantaneous = self.prelax {
                crate::multimat::relax_pressure_instantaneous(
                    &self.layout,
                    &self.materials,
                    &mut means,
                );
            }
            clean_trace_materials(
                &self.layout,
                &self.materials,
                &mut means,
                e,
                mesh.element_centroid(e),
            )?;
            for (c, &m) in means.iter().enumerate() {
                u.set(e, c * ndof, m);
            }
        }
        Ok(())
    }
}
