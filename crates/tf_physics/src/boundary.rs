// crates/tf_physics/src/boundary.rs

//! 边界条件表
//!
//! 每个边集编号恰好绑定一种边界策略，初始化后不再变更：
//! - `Dirichlet`: 按问题解析解施加，以增量形式（t+dt 解减 t 解）
//!   写入残差——点格式推进的是增量而不是解本身
//! - `Symmetry`: 把速度的法向分量投影掉 v ← v - (v·n)n
//! - `Farfield`: 按法向马赫数分类为超音速进/出口或亚音速进/出口
//! - `SubsonicOutlet`: 给定背压的亚音速出口，密度/速度外推
//! - `Extrapolate`: 零阶外推，边界不加任何修正

use std::collections::BTreeMap;

use glam::DVec3;
use tf_foundation::{TfError, TfResult};

use crate::types::FarfieldState;
use crate::eos::Material;

/// 边界策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcKind {
    Dirichlet,
    Symmetry,
    Farfield,
    SubsonicOutlet,
    Extrapolate,
}

/// 边集编号 → 边界策略
#[derive(Debug, Clone, Default)]
pub struct BcTable {
    map: BTreeMap<usize, BcKind>,
}

impl BcTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定一个边集的策略；重复绑定是配置错误
    pub fn set(&mut self, sideset: usize, kind: BcKind) -> TfResult<()> {
        if self.map.insert(sideset, kind).is_some() {
            return Err(TfError::config(format!("边集 {sideset} 被指派了多种边界条件")));
        }
        Ok(())
    }

    pub fn get(&self, sideset: usize) -> Option<BcKind> {
        self.map.get(&sideset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, BcKind)> + '_ {
        self.map.iter().map(|(&s, &k)| (s, k))
    }
}

/// 对称边界: 投影掉向量场的法向分量
#[inline]
pub fn symmetry_project(v: DVec3, n: DVec3) -> DVec3 {
    v - v.dot(n) * n
}

/// 远场边界的马赫数分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarfieldRegime {
    /// M ≤ -1: 超音速入流, 全部取远场状态
    SupersonicInflow,
    /// -1 < M < 0: 亚音速入流, 压力取内部、其余取远场
    SubsonicInflow,
    /// 0 ≤ M < 1: 亚音速出流, 压力取远场、其余取内部
    SubsonicOutflow,
    /// M ≥ 1: 超音速出流, 全部取内部状态
    SupersonicOutflow,
}

/// 按边界法向马赫数分类远场状态
pub fn classify_farfield(vn: f64, soundspeed: f64) -> FarfieldRegime {
    let mach = vn / soundspeed;
    if mach <= -1.0 {
        FarfieldRegime::SupersonicInflow
    } else if mach < 0.0 {
        FarfieldRegime::SubsonicInflow
    } else if mach < 1.0 {
        FarfieldRegime::SubsonicOutflow
    } else {
        FarfieldRegime::SupersonicOutflow
    }
}

/// 单材料守恒状态的远场边界值
///
/// `inner` 为内部单元/节点的 [ρ, ρu, ρv, ρw, ρE]，`n` 为外法向。
pub fn farfield_state(
    inner: &[f64],
    n: DVec3,
    far: &FarfieldState,
    material: &Material,
) -> [f64; 5] {
    let rho = inner[0];
    let vel = DVec3::new(inner[1] / rho, inner[2] / rho, inner[3] / rho);
    let p_in = material.pressure(rho, vel.x, vel.y, vel.z, inner[4], 1.0);
    let a = material.soundspeed(rho, p_in.max(0.0), 1.0);

    let pack = |rho: f64, v: DVec3, p: f64| -> [f64; 5] {
        [
            rho,
            rho * v.x,
            rho * v.y,
            rho * v.z,
            material.total_energy(rho, v.x, v.y, v.z, p),
        ]
    };

    match classify_farfield(vel.dot(n), a) {
        FarfieldRegime::SupersonicInflow => pack(far.density, far.velocity, far.pressure),
        FarfieldRegime::SubsonicInflow => pack(far.density, far.velocity, p_in),
        FarfieldRegime::SubsonicOutflow => pack(rho, vel, far.pressure),
        FarfieldRegime::SupersonicOutflow => pack(rho, vel, p_in),
    }
}

/// 亚音速出口边界值: 密度与速度外推, 能量按给定背压重算
pub fn subsonic_outlet_state(inner: &[f64], p_out: f64, material: &Material) -> [f64; 5] {
    let rho = inner[0];
    let (u, v, w) = (inner[1] / rho, inner[2] / rho, inner[3] / rho);
    [
        inner[0],
        inner[1],
        inner[2],
        inner[3],
        material.total_energy(rho, u, v, w, p_out),
    ]
}
