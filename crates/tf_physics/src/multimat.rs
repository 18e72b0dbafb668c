// crates/tf_physics/src/multimat.rs

//! 多材料状态布局与痕量材料修正
//!
//! 多材料体系的守恒量布局（nmat 种材料共 3·nmat+3 个分量）：
//! `[α_k | αρ_k | ρu ρv ρw | αρE_k]`
//! 体积分数、偏密度、整体动量、偏总能依次排列。
//!
//! 痕量材料修正是一个有意为之、有文档记载的正则化：
//! 激波扫过含极少量次要材料的单元时会产生非物理状态并使求解发散，
//! 因此每步结束后把体积分数低于阈值或有效压力为负的材料状态
//! 用多数材料外推替换。修正顺序固定：
//! 先修正少数材料 → 把体积/能量差额补偿进多数材料 → 重新归一化。
//! 修正之后仍然出现负偏密度则属致命错误，打印诊断状态后中止。

use glam::DVec3;
use tf_foundation::tolerance::{ALPHA_FLOOR, PRESSURE_FLOOR, TRACE_ALPHA_EPS};
use tf_foundation::{TfError, TfResult};

use crate::eos::Material;

/// 多材料分量布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatLayout {
    pub nmat: usize,
}

impl MatLayout {
    pub fn new(nmat: usize) -> Self {
        Self { nmat }
    }

    /// 守恒分量总数
    #[inline]
    pub fn ncomp(&self) -> usize {
        3 * self.nmat + 3
    }

    /// 材料 k 的体积分数
    #[inline]
    pub fn volfrac(&self, k: usize) -> usize {
        k
    }

    /// 材料 k 的偏密度 αρ
    #[inline]
    pub fn density(&self, k: usize) -> usize {
        self.nmat + k
    }

    /// 整体动量分量 i ∈ 0..3
    #[inline]
    pub fn momentum(&self, i: usize) -> usize {
        2 * self.nmat + i
    }

    /// 材料 k 的偏总能 αρE
    #[inline]
    pub fn energy(&self, k: usize) -> usize {
        2 * self.nmat + 3 + k
    }

    /// 整体密度 ρ = Σ αρ_k
    #[inline]
    pub fn bulk_density(&self, u: &[f64]) -> f64 {
        (0..self.nmat).map(|k| u[self.density(k)]).sum()
    }

    /// 整体速度
    #[inline]
    pub fn velocity(&self, u: &[f64]) -> DVec3 {
        let rho = self.bulk_density(u);
        DVec3::new(
            u[self.momentum(0)] / rho,
            u[self.momentum(1)] / rho,
            u[self.momentum(2)] / rho,
        )
    }

    /// 材料 k 的偏压力 αp
    #[inline]
    pub fn material_pressure(&self, u: &[f64], materials: &[Material], k: usize) -> f64 {
        let v = self.velocity(u);
        materials[k].pressure(
            u[self.density(k)],
            v.x,
            v.y,
            v.z,
            u[self.energy(k)],
            u[self.volfrac(k)],
        )
    }

    /// 整体压力 p = Σ αp_k
    pub fn bulk_pressure(&self, u: &[f64], materials: &[Material]) -> f64 {
        (0..self.nmat)
            .map(|k| self.material_pressure(u, materials, k))
            .sum()
    }

    /// 混合物最大信号声速（时间步长与通量耗散用）
    pub fn max_soundspeed(&self, u: &[f64], materials: &[Material]) -> f64 {
        let mut a = 0.0f64;
        for k in 0..self.nmat {
            let alpha = u[self.volfrac(k)].max(ALPHA_FLOOR);
            let arho = u[self.density(k)].max(ALPHA_FLOOR);
            let apr = self.material_pressure(u, materials, k);
            a = a.max(materials[k].soundspeed(arho, apr.max(alpha * PRESSURE_FLOOR), alpha));
        }
        a
    }
}

/// 痕量材料修正
///
/// 对一个单元的均值状态 `u` 就地修正，返回修正后状态是否物理。
/// 步骤（顺序不可调换）：
/// 1. 找到体积分数最大的多数材料 kmax，取其压力/温度为目标状态
/// 2. 对每个体积分数过小或有效压力为负的少数材料：
///    体积分数夹到下限，偏密度/偏能量按目标压力温度重建，
///    记录体积与能量差额
/// 3. 差额补偿进多数材料并重算其能量
/// 4. 体积分数、偏密度、偏能量统一除以 Σα 归一化
/// 5. 若任何偏密度仍为负，报致命错误并携带诊断状态
pub fn clean_trace_materials(
    layout: &MatLayout,
    materials: &[Material],
    u: &mut [f64],
    element: usize,
    centroid: DVec3,
) -> TfResult<()> {
    let nmat = layout.nmat;
    if nmat == 1 {
        return Ok(());
    }
    let vel = layout.velocity(u);

    // 多数材料及其目标压力/温度
    let kmax = (0..nmat)
        .max_by(|&a, &b| {
            u[layout.volfrac(a)]
                .partial_cmp(&u[layout.volfrac(b)])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    let almax = u[layout.volfrac(kmax)];
    let pmax = layout.material_pressure(u, materials, kmax) / almax;
    let tmax = materials[kmax].temperature(
        u[layout.density(kmax)],
        vel.x,
        vel.y,
        vel.z,
        u[layout.energy(kmax)],
        almax,
    );
    let p_target = pmax.max(PRESSURE_FLOOR);

    // 少数材料修正, 差额累计
    let mut d_al = 0.0;
    let mut d_are = 0.0;
    for k in 0..nmat {
        if k == kmax {
            continue;
        }
        let alk = u[layout.volfrac(k)];
        let apk = layout.material_pressure(u, materials, k);
        let minority = alk < TRACE_ALPHA_EPS || apk + alk * materials[k].pstiff < 0.0;
        if !minority {
            continue;
        }
        let alk_new = if alk <= 0.0 { ALPHA_FLOOR } else { alk };
        let rhok = if alk <= 0.0 {
            materials[k].density(p_target, tmax)
        } else {
            u[layout.density(k)] / alk
        };
        let are_new = alk_new
            * materials[k].total_energy(rhok.max(ALPHA_FLOOR), vel.x, vel.y, vel.z, p_target);
        d_al += alk - alk_new;
        d_are += u[layout.energy(k)] - are_new;
        u[layout.volfrac(k)] = alk_new;
        u[layout.density(k)] = alk_new * rhok.max(ALPHA_FLOOR);
        u[layout.energy(k)] = are_new;
    }

    // 差额补偿进多数材料
    u[layout.volfrac(kmax)] += d_al;
    u[layout.energy(kmax)] += d_are;

    // 归一化 Σα = 1
    let alsum: f64 = (0..nmat).map(|k| u[layout.volfrac(k)]).sum();
    for k in 0..nmat {
        u[layout.volfrac(k)] /= alsum;
        u[layout.density(k)] /= alsum;
        u[layout.energy(k)] /= alsum;
    }

    // 修正后负偏密度无法挽救
    for k in 0..nmat {
        let arho = u[layout.density(k)];
        if arho < 0.0 {
            tracing::error!(
                element,
                material = k,
                alpha = u[layout.volfrac(k)],
                partial_density = arho,
                partial_pressure = layout.material_pressure(u, materials, k),
                major_pressure = p_target,
                major_temperature = tmax,
                velocity = ?vel,
                "痕量材料修正后仍出现负偏密度"
            );
            return Err(TfError::NegativePartialDensity {
                element,
                material: k,
                partial_density: arho,
                x: centroid.x,
                y: centroid.y,
                z: centroid.z,
            });
        }
    }
    Ok(())
}

/// 瞬时压力松弛：把各材料压力直接拉到混合压力
///
/// 保持体积分数与偏密度不变，按平衡压力重建各材料偏总能。
pub fn relax_pressure_instantaneous(layout: &MatLayout, materials: &[Material], u: &mut [f64]) {
    let vel = layout.velocity(u);
    let p_eq = layout.bulk_pressure(u, materials).max(PRESSURE_FLOOR);
    for k in 0..layout.nmat {
        let alk = u[layout.volfrac(k)].max(ALPHA_FLOOR);
        let rhok = u[layout.density(k)] / alk;
        u[layout.energy(k)] =
            alk * materials[k].total_energy(rhok, vel.x, vel.y, vel.z, p_eq);
    }
}
