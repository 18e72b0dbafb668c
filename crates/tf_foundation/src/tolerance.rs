// crates/tf_foundation/src/tolerance.rs

//! 数值容差常量
//!
//! 集中定义算法中使用的小量，避免魔法数字散落在各处。

/// MUSCL 重构的除零保护小量
pub const MUSCL_EPS: f64 = 1.0e-9;

/// 痕量材料体积分数阈值：低于此值的材料状态会被多数材料外推替换
pub const TRACE_ALPHA_EPS: f64 = 1.0e-2;

/// 体积分数下限（防止精确为零导致的除零）
pub const ALPHA_FLOOR: f64 = 1.0e-14;

/// 压力下限
pub const PRESSURE_FLOOR: f64 = 1.0e-14;

/// 浮点比较的一般容差
pub const FLOAT_EPS: f64 = 1.0e-12;

/// WENO 振荡指示子的除零保护小量
pub const WENO_EPS: f64 = 1.0e-12;
