// crates/tf_physics/src/riemann/mod.rs

//! 黎曼通量求解器
//!
//! 给定面两侧的守恒状态和单位法向，返回每分量的数值通量；
//! 多材料体系额外返回界面速度和每材料界面压力，
//! 供非守恒项积分使用。
//!
//! 所有通量都满足左右交换反对称性：
//! `flux(L, R, n) == -flux(R, L, -n)`（逐分量）。

mod ausm;
mod rusanov;

pub use ausm::AusmMultiMat;
pub use rusanov::{RusanovCompFlow, RusanovMultiMat};

use glam::DVec3;

use crate::eos::Material;
use crate::multimat::MatLayout;
use crate::types::FluxKind;

/// 一次通量求值的输出
#[derive(Debug, Clone)]
pub struct FluxData {
    /// 每守恒分量的数值通量
    pub flux: Vec<f64>,
    /// 界面速度（多材料非守恒项用；单材料为速度平均）
    pub interface_velocity: DVec3,
    /// 每材料的界面压力 αp*（单材料体系为空）
    pub material_pressure: Vec<f64>,
}

/// 黎曼通量求解器接口
pub trait RiemannFlux: Send + Sync {
    fn name(&self) -> &'static str;

    /// 在单位法向 `normal` 上求左右状态之间的数值通量
    fn flux(&self, normal: DVec3, left: &[f64], right: &[f64]) -> FluxData;

    /// 最大信号速度 |v·n| + a（CFL 时间步长与耗散共用的波速估计）
    fn max_signal_speed(&self, normal: DVec3, left: &[f64], right: &[f64]) -> f64;
}

/// 按配置创建多材料通量求解器
pub fn create_multimat_flux(
    kind: FluxKind,
    layout: MatLayout,
    materials: Vec<Material>,
) -> Box<dyn RiemannFlux> {
    match kind {
        FluxKind::Rusanov => Box::new(RusanovMultiMat::new(layout, materials)),
        FluxKind::Ausm => Box::new(AusmMultiMat::new(layout, materials)),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// 反对称性检查: flux(L,R,n) == -flux(R,L,-n)
    pub fn assert_antisymmetric(
        solver: &dyn RiemannFlux,
        normal: DVec3,
        left: &[f64],
        right: &[f64],
        tol: f64,
    ) {
        let fwd = solver.flux(normal, left, right);
        let bwd = solver.flux(-normal, right, left);
        for (c, (a, b)) in fwd.flux.iter().zip(&bwd.flux).enumerate() {
            let scale = a.abs().max(b.abs()).max(1.0);
            assert!(
                (a + b).abs() <= tol * scale,
                "{} 分量 {c} 不反对称: {a} vs {b}",
                solver.name()
            );
        }
    }
}
