// crates/tf_physics/src/problems.rs

//! 算例定义
//!
//! 每个方程体系配一个问题策略接口：解析解（或初始条件）、
//! 源项等由具体算例提供，装配器通过接口消费。
//! Dirichlet 边界的增量形式也从这里取 t 与 t+dt 两个时刻的解析解。

use glam::DVec3;

use crate::eos::Material;
use crate::multimat::MatLayout;

// ============================================================================
// 标量输运
// ============================================================================

/// 标量输运问题策略
pub trait TransportProblem: Send + Sync {
    /// 分量数
    fn ncomp(&self) -> usize;

    /// 解析解（初始条件取 t=0）
    fn solution(&self, x: DVec3, t: f64) -> Vec<f64>;

    /// 给定点处的输运速度场
    fn velocity(&self, x: DVec3, t: f64) -> DVec3;
}

/// 常速度平移的高斯峰
///
/// 解析解为初始峰沿速度方向的平移，整周期后回到原位，
/// 用于验证装配与时间推进的组合精度。
#[derive(Debug, Clone)]
pub struct GaussianHump {
    pub center: DVec3,
    pub width: f64,
    pub velocity: DVec3,
}

impl TransportProblem for GaussianHump {
    fn ncomp(&self) -> usize {
        1
    }

    fn solution(&self, x: DVec3, t: f64) -> Vec<f64> {
        let d = x - (self.center + t * self.velocity);
        vec![(-d.length_squared() / (2.0 * self.width * self.width)).exp()]
    }

    fn velocity(&self, _x: DVec3, _t: f64) -> DVec3 {
        self.velocity
    }
}

/// 旋转速度场中的开槽圆柱（Zalesak 盘, 含圆锥与余弦峰）
///
/// 速度场 v = (0.5−y, x−0.5, 0) 绕 (0.5, 0.5) 匀角速旋转，
/// 解析解为初始形状反向旋转 t 弧度后的取值。
/// 间断（圆柱槽）与光滑体（锥、峰）并存，是限制器的标准考题。
#[derive(Debug, Clone, Copy, Default)]
pub struct SlottedCylinder;

impl SlottedCylinder {
    const R0: f64 = 0.15;

    fn shapes(x: f64, y: f64) -> f64 {
        // 开槽圆柱, 中心 (0.5, 0.75)
        let rc = ((x - 0.5) * (x - 0.5) + (y - 0.75) * (y - 0.75)).sqrt();
        if rc <= Self::R0 && !((x - 0.5).abs() < 0.025 && y < 0.85) {
            return 1.0;
        }
        // 圆锥, 中心 (0.5, 0.25)
        let rk = ((x - 0.5) * (x - 0.5) + (y - 0.25) * (y - 0.25)).sqrt();
        if rk <= Self::R0 {
            return 1.0 - rk / Self::R0;
        }
        // 余弦峰, 中心 (0.25, 0.5)
        let rh = ((x - 0.25) * (x - 0.25) + (y - 0.5) * (y - 0.5)).sqrt();
        if rh <= Self::R0 {
            return 0.25 * (1.0 + (std::f64::consts::PI * rh / Self::R0).cos());
        }
        0.0
    }
}

impl TransportProblem for SlottedCylinder {
    fn ncomp(&self) -> usize {
        1
    }

    fn solution(&self, x: DVec3, t: f64) -> Vec<f64> {
        // 把采样点反向旋转回初始时刻
        let (dx, dy) = (x.x - 0.5, x.y - 0.5);
        let (s, c) = t.sin_cos();
        let x0 = 0.5 + c * dx + s * dy;
        let y0 = 0.5 - s * dx + c * dy;
        vec![Self::shapes(x0, y0)]
    }

    fn velocity(&self, x: DVec3, _t: f64) -> DVec3 {
        DVec3::new(0.5 - x.y, x.x - 0.5, 0.0)
    }
}

/// 剪切速度场中的斜坡（速度随空间变化的输运检验）
#[derive(Debug, Clone)]
pub struct ShearLayer {
    pub shear: f64,
}

impl TransportProblem for ShearLayer {
    fn ncomp(&self) -> usize {
        1
    }

    fn solution(&self, x: DVec3, t: f64) -> Vec<f64> {
        // 特征线 x - (1 + shear·y)·t = x0 上的初值
        let x0 = x.x - (1.0 + self.shear * x.y) * t;
        vec![x0]
    }

    fn velocity(&self, x: DVec3, _t: f64) -> DVec3 {
        DVec3::new(1.0 + self.shear * x.y, 0.0, 0.0)
    }
}

// ============================================================================
// 单材料可压缩流
// ============================================================================

/// 单材料可压缩流问题策略
pub trait CompFlowProblem: Send + Sync {
    /// 解析解/初始条件 [ρ, ρu, ρv, ρw, ρE]
    fn solution(&self, x: DVec3, t: f64, material: &Material) -> [f64; 5];
}

/// Sod 激波管
///
/// x < 0.5: (ρ=1, u=0, p=1); x ≥ 0.5: (ρ=0.125, u=0, p=0.1)。
/// 初始条件不随时间变化（Dirichlet 端远离波系）。
#[derive(Debug, Clone, Copy, Default)]
pub struct SodShocktube;

impl CompFlowProblem for SodShocktube {
    fn solution(&self, x: DVec3, _t: f64, material: &Material) -> [f64; 5] {
        let (rho, p) = if x.x < 0.5 { (1.0, 1.0) } else { (0.125, 0.1) };
        [rho, 0.0, 0.0, 0.0, material.total_energy(rho, 0.0, 0.0, 0.0, p)]
    }
}

/// 均匀流（远场/自由流边界检验, 也是能量沉积算例的背景态）
#[derive(Debug, Clone, Copy)]
pub struct UniformFlow {
    pub density: f64,
    pub pressure: f64,
    pub velocity: DVec3,
}

impl CompFlowProblem for UniformFlow {
    fn solution(&self, _x: DVec3, _t: f64, material: &Material) -> [f64; 5] {
        let v = self.velocity;
        [
            self.density,
            self.density * v.x,
            self.density * v.y,
            self.density * v.z,
            material.total_energy(self.density, v.x, v.y, v.z, self.pressure),
        ]
    }
}

// ============================================================================
// 多材料
// ============================================================================

/// 多材料问题策略
pub trait MultiMatProblem: Send + Sync {
    /// 解析解/初始条件, 布局见 [`MatLayout`]
    fn solution(&self, layout: &MatLayout, materials: &[Material], x: DVec3, t: f64) -> Vec<f64>;
}

/// 材料界面匀速平移
///
/// 压力与速度全场均匀，材料界面（x = `interface` 平面）以
/// 该速度平移；好的格式应当只输运体积分数而不扰动压力场。
#[derive(Debug, Clone, Copy)]
pub struct InterfaceAdvection {
    pub interface: f64,
    pub velocity: DVec3,
    pub pressure: f64,
    /// 两侧材料密度 (界面左 ρ0, 右 ρ1)
    pub rho: [f64; 2],
}

impl MultiMatProblem for InterfaceAdvection {
    fn solution(&self, layout: &MatLayout, materials: &[Material], x: DVec3, t: f64) -> Vec<f64> {
        let mut u = vec![0.0; layout.ncomp()];
        let xi = self.interface + self.velocity.x * t;
        // 痕量下限, 与修正阈值错开一个量级
        let eps = 1.0e-10;
        let (al0, al1) = if x.x < xi {
            (1.0 - eps, eps)
        } else {
            (eps, 1.0 - eps)
        };
        let v = self.velocity;
        u[layout.volfrac(0)] = al0;
        u[layout.volfrac(1)] = al1;
        u[layout.density(0)] = al0 * self.rho[0];
        u[layout.density(1)] = al1 * self.rho[1];
        let rho = al0 * self.rho[0] + al1 * self.rho[1];
        for i in 0..3 {
            u[layout.momentum(i)] = rho * v[i];
        }
        u[layout.energy(0)] =
            al0 * materials[0].total_energy(self.rho[0], v.x, v.y, v.z, self.pressure);
        u[layout.energy(1)] =
            al1 * materials[1].total_energy(self.rho[1], v.x, v.y, v.z, self.pressure);
        u
    }
}

/// 双材料激波管（左右各一种材料的 Sod 变体）
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiMatSod;

impl MultiMatProblem for MultiMatSod {
    fn solution(&self, layout: &MatLayout, materials: &[Material], x: DVec3, _t: f64) -> Vec<f64> {
        let mut u = vec![0.0; layout.ncomp()];
        let eps = 1.0e-10;
        let left = x.x < 0.5;
        let (al0, al1) = if left { (1.0 - eps, eps) } else { (eps, 1.0 - eps) };
        let (rho0, rho1) = (1.0, 0.125);
        let p = if left { 1.0 } else { 0.1 };
        u[layout.volfrac(0)] = al0;
        u[layout.volfrac(1)] = al1;
        u[layout.density(0)] = al0 * rho0;
        u[layout.density(1)] = al1 * rho1;
        u[layout.energy(0)] = al0 * materials[0].total_energy(rho0, 0.0, 0.0, 0.0, p);
        u[layout.energy(1)] = al1 * materials[1].total_energy(rho1, 0.0, 0.0, 0.0, p);
        u
    }
}

/// 气体撞击: 高密度弹体以初速撞入静止背景气
///
/// 弹体（材料 0）占据 x ∈ [slab[0], slab[1]] 的平板区域并以
/// `speed` 沿 x 正向运动，背景（材料 1）静止；全场压力均匀。
/// 撞击面前方应当形成激波、后方形成稀疏波。
#[derive(Debug, Clone, Copy)]
pub struct GasImpact {
    /// 弹体区间 [x0, x1]
    pub slab: [f64; 2],
    /// 弹体/背景密度
    pub rho: [f64; 2],
    /// 弹体初速（x 向）
    pub speed: f64,
    pub pressure: f64,
}

impl MultiMatProblem for GasImpact {
    fn solution(&self, layout: &MatLayout, materials: &[Material], x: DVec3, _t: f64) -> Vec<f64> {
        let mut u = vec![0.0; layout.ncomp()];
        let eps = 1.0e-10;
        let inside = x.x > self.slab[0] && x.x < self.slab[1];
        let (al0, al1) = if inside { (1.0 - eps, eps) } else { (eps, 1.0 - eps) };
        let vx = if inside { self.speed } else { 0.0 };
        u[layout.volfrac(0)] = al0;
        u[layout.volfrac(1)] = al1;
        u[layout.density(0)] = al0 * self.rho[0];
        u[layout.density(1)] = al1 * self.rho[1];
        let rho = al0 * self.rho[0] + al1 * self.rho[1];
        u[layout.momentum(0)] = rho * vx;
        u[layout.energy(0)] =
            al0 * materials[0].total_energy(self.rho[0], vx, 0.0, 0.0, self.pressure);
        u[layout.energy(1)] =
            al1 * materials[1].total_energy(self.rho[1], vx, 0.0, 0.0, self.pressure);
        u
    }
}
