// crates/tf_physics/src/lib.rs

//! TetraFlow 物理层
//!
//! 非结构四面体网格上的守恒律求解核心：
//! - 方程体系: 标量输运、单材料可压缩流、多材料可压缩流
//! - 空间离散: 点格式（两阶段 / 边格式 MUSCL）与单元格式（P0/P1）
//! - 稳定机制: FCT 限制（点格式）、斜率限制器（单元格式）、
//!   痕量材料修正与压力松弛（多材料）
//! - 并行基础: 分区边界交换、全归约、分布式共轭梯度
//!
//! 网格与拓扑来自 `tf_mesh`，通信原语来自 `tf_runtime`。

pub mod basis;
pub mod boundary;
pub mod engine;
pub mod eos;
pub mod fct;
pub mod fields;
pub mod limiter;
pub mod linear_algebra;
pub mod multimat;
pub mod pde;
pub mod problems;
pub mod reconstruction;
pub mod riemann;
pub mod types;

pub use boundary::{BcKind, BcTable};
pub use engine::{CellStepper, NodeStepper};
pub use eos::Material;
pub use fct::FluxCorrector;
pub use fields::Fields;
pub use multimat::MatLayout;
pub use pde::{CompFlow, MultiMat, PdeSystem, Transport};
pub use types::{FlowConfig, FluxKind, LimiterKind, PrelaxMode, SchemeKind};
