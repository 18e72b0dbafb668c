// crates/tf_physics/src/riemann/rusanov.rs

//! Rusanov（局部 Lax-Friedrichs）通量
//!
//! F = ½(F_L + F_R) - ½·S_max·(U_R - U_L)
//! S_max 取两侧 |v·n| + a 的较大者。耗散最大但对任意状态稳健，
//! 同一个 S_max 也用于 CFL 时间步长估计。

use glam::DVec3;
use tf_foundation::tolerance::ALPHA_FLOOR;

use crate::eos::Material;
use crate::multimat::MatLayout;
use crate::riemann::{FluxData, RiemannFlux};

// ============================================================================
// 单材料可压缩流
// ============================================================================

/// 单材料可压缩流的 Rusanov 通量
///
/// 守恒量布局 [ρ, ρu, ρv, ρw, ρE]。
#[derive(Debug, Clone)]
pub struct RusanovCompFlow {
    material: Material,
}

/// 单材料守恒分量数
pub const COMPFLOW_NCOMP: usize = 5;

impl RusanovCompFlow {
    pub fn new(material: Material) -> Self {
        Self { material }
    }

    /// 一侧的 (法向速度, 压力, 声速, 速度)
    fn primitives(&self, u: &[f64], normal: DVec3) -> (f64, f64, f64, DVec3) {
        let rho = u[0];
        let vel = DVec3::new(u[1] / rho, u[2] / rho, u[3] / rho);
        let p = self.material.pressure(rho, vel.x, vel.y, vel.z, u[4], 1.0);
        let a = self.material.soundspeed(rho, p, 1.0);
        (vel.dot(normal), p, a, vel)
    }

    /// 物理通量在法向上的投影
    fn physical_flux(u: &[f64], vn: f64, p: f64, normal: DVec3) -> [f64; COMPFLOW_NCOMP] {
        [
            u[0] * vn,
            u[1] * vn + p * normal.x,
            u[2] * vn + p * normal.y,
            u[3] * vn + p * normal.z,
            (u[4] + p) * vn,
        ]
    }
}

impl RiemannFlux for RusanovCompFlow {
    fn name(&self) -> &'static str {
        "Rusanov"
    }

    fn flux(&self, normal: DVec3, left: &[f64], right: &[f64]) -> FluxData {
        let (vnl, pl, al, vell) = self.primitives(left, normal);
        let (vnr, pr, ar, velr) = self.primitives(right, normal);
        let smax = (vnl.abs() + al).max(vnr.abs() + ar);

        let fl = Self::physical_flux(left, vnl, pl, normal);
        let fr = Self::physical_flux(right, vnr, pr, normal);
        let flux = (0..COMPFLOW_NCOMP)
            .map(|c| 0.5 * (fl[c] + fr[c]) - 0.5 * smax * (right[c] - left[c]))
            .collect();

        FluxData {
            flux,
            interface_velocity: 0.5 * (vell + velr),
            material_pressure: Vec::new(),
        }
    }

    fn max_signal_speed(&self, normal: DVec3, left: &[f64], right: &[f64]) -> f64 {
        let (vnl, _, al, _) = self.primitives(left, normal);
        let (vnr, _, ar, _) = self.primitives(right, normal);
        (vnl.abs() + al).max(vnr.abs() + ar)
    }
}

// ============================================================================
// 多材料
// ============================================================================

/// 多材料体系的 Rusanov 通量
///
/// 体积分数方程只含对流部分；界面速度与每材料界面压力
/// 取两侧算术平均，交给非守恒项积分。
#[derive(Debug, Clone)]
pub struct RusanovMultiMat {
    layout: MatLayout,
    materials: Vec<Material>,
}

impl RusanovMultiMat {
    pub fn new(layout: MatLayout, materials: Vec<Material>) -> Self {
        Self { layout, materials }
    }

    /// 一侧的 (速度, 法向速度, 每材料 αp, 整体压力, 最大声速)
    fn primitives(&self, u: &[f64], normal: DVec3) -> (DVec3, f64, Vec<f64>, f64, f64) {
        let l = &self.layout;
        let vel = l.velocity(u);
        let apk: Vec<f64> = (0..l.nmat)
            .map(|k| l.material_pressure(u, &self.materials, k))
            .collect();
        let p: f64 = apk.iter().sum();
        let a = l.max_soundspeed(u, &self.materials);
        (vel, vel.dot(normal), apk, p, a)
    }

    fn physical_flux(&self, u: &[f64], vn: f64, apk: &[f64], p: f64, normal: DVec3) -> Vec<f64> {
        let l = &self.layout;
        let mut f = vec![0.0; l.ncomp()];
        for k in 0..l.nmat {
            f[l.volfrac(k)] = u[l.volfrac(k)] * vn;
            f[l.density(k)] = u[l.density(k)] * vn;
            f[l.energy(k)] = (u[l.energy(k)] + apk[k]) * vn;
        }
        for i in 0..3 {
            f[l.momentum(i)] = u[l.momentum(i)] * vn + p * normal[i];
        }
        f
    }
}

impl RiemannFlux for RusanovMultiMat {
    fn name(&self) -> &'static str {
        "Rusanov"
    }

    fn flux(&self, normal: DVec3, left: &[f64], right: &[f64]) -> FluxData {
        let (vell, vnl, apkl, pl, al) = self.primitives(left, normal);
        let (velr, vnr, apkr, pr, ar) = self.primitives(right, normal);
        let smax = (vnl.abs() + al).max(vnr.abs() + ar);

        let fl = self.physical_flux(left, vnl, &apkl, pl, normal);
        let fr = self.physical_flux(right, vnr, &apkr, pr, normal);
        let flux = (0..self.layout.ncomp())
            .map(|c| 0.5 * (fl[c] + fr[c]) - 0.5 * smax * (right[c] - left[c]))
            .collect();

        let material_pressure = (0..self.layout.nmat)
            .map(|k| {
                0.5 * (apkl[k] / left[self.layout.volfrac(k)].max(ALPHA_FLOOR)
                    + apkr[k] / right[self.layout.volfrac(k)].max(ALPHA_FLOOR))
            })
            .collect();

        FluxData {
            flux,
            interface_velocity: 0.5 * (vell + velr),
            material_pressure,
        }
    }

    fn max_signal_speed(&self, normal: DVec3, left: &[f64], right: &[f64]) -> f64 {
        let (_, vnl, _, _, al) = self.primitives(left, normal);
        let (_, vnr, _, _, ar) = self.primitives(right, normal);
        (vnl.abs() + al).max(vnr.abs() + ar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riemann::testutil::assert_antisymmetric;

    fn compflow_state(m: &Material, rho: f64, vel: DVec3, p: f64) -> [f64; COMPFLOW_NCOMP] {
        [
            rho,
            rho * vel.x,
            rho * vel.y,
            rho * vel.z,
            m.total_energy(rho, vel.x, vel.y, vel.z, p),
        ]
    }

    #[test]
    fn test_compflow_consistency() {
        // 两侧相同 → 通量退化为物理通量
        let m = Material::ideal_gas(1.4);
        let solver = RusanovCompFlow::new(m);
        let u = compflow_state(&m, 1.0, DVec3::new(2.0, 0.0, 0.0), 1.0);
        let n = DVec3::X;
        let f = solver.flux(n, &u, &u);
        // 质量通量 = ρ·vn
        assert!((f.flux[0] - 2.0).abs() < 1e-12);
        // 动量 x = ρu·vn + p
        assert!((f.flux[1] - (2.0 * 2.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_compflow_antisymmetry() {
        let m = Material::ideal_gas(1.4);
        let solver = RusanovCompFlow::new(m);
        let l = compflow_state(&m, 1.0, DVec3::new(0.3, -0.1, 0.2), 1.0);
        let r = compflow_state(&m, 0.125, DVec3::new(-0.5, 0.0, 0.1), 0.1);
        let n = DVec3::new(1.0, 2.0, -0.5).normalize();
        assert_antisymmetric(&solver, n, &l, &r, 1e-12);
    }

    #[test]
    fn test_multimat_antisymmetry() {
        let layout = MatLayout::new(2);
        let materials = vec![Material::ideal_gas(1.4), Material::ideal_gas(1.6)];
        let solver = RusanovMultiMat::new(layout, materials.clone());

        let mk_state = |al0: f64, rho0: f64, rho1: f64, vel: DVec3, p: f64| {
            let mut u = vec![0.0; layout.ncomp()];
            let al1 = 1.0 - al0;
            u[layout.volfrac(0)] = al0;
            u[layout.volfrac(1)] = al1;
            u[layout.density(0)] = al0 * rho0;
            u[layout.density(1)] = al1 * rho1;
            let rho = al0 * rho0 + al1 * rho1;
            for i in 0..3 {
                u[layout.momentum(i)] = rho * vel[i];
            }
            u[layout.energy(0)] = al0 * materials[0].total_energy(rho0, vel.x, vel.y, vel.z, p);
            u[layout.energy(1)] = al1 * materials[1].total_energy(rho1, vel.x, vel.y, vel.z, p);
            u
        };

        let l = mk_state(0.7, 1.0, 5.0, DVec3::new(0.2, 0.1, 0.0), 1.0e5);
        let r = mk_state(0.3, 0.8, 4.0, DVec3::new(-0.4, 0.0, 0.3), 2.0e5);
        let n = DVec3::new(0.0, 1.0, 1.0).normalize();
        assert_antisymmetric(&solver, n, &l, &r, 1e-12);
    }

    #[test]
    fn test_signal_speed_bounds_flux_jump() {
        let m = Material::ideal_gas(1.4);
        let solver = RusanovCompFlow::new(m);
        let l = compflow_state(&m, 1.0, DVec3::ZERO, 1.0);
        let r = compflow_state(&m, 0.125, DVec3::ZERO, 0.1);
        let s = solver.max_signal_speed(DVec3::X, &l, &r);
        // 静止气体: S_max = max(a_L, a_R) = a_L
        let al = m.soundspeed(1.0, 1.0, 1.0);
        assert!((s - al).abs() < 1e-12);
    }
}
