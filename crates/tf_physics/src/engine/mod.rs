// crates/tf_physics/src/engine/mod.rs

//! 时间推进器
//!
//! - [`NodeStepper`]: 点格式（输运/单材料可压缩流），
//!   分区并行，FCT 限制可选
//! - [`CellStepper`]: 单元格式（多材料），P0 欧拉 / P1 SSP-RK2

pub mod dg;
pub mod diagcg;

pub use dg::{CellStepReport, CellStepper};
pub use diagcg::{NodeStepper, StepReport};
