// crates/tf_foundation/src/lib.rs

//! TetraFlow 基础层
//!
//! 提供整个项目共享的基础设施：
//! - `error`: 统一错误类型 `TfError` 和结果别名 `TfResult`
//! - `tolerance`: 数值容差常量
//!
//! # 设计原则
//!
//! 1. **层次化**: 基础层只定义核心错误，物理相关错误变体集中在此，
//!    但构造位置在 `tf_physics` 中
//! 2. **快速失败**: 数值不变量（雅可比正定性、数组尺寸一致性）违例
//!    属于程序/数据错误，立即升级为错误返回，不静默忽略

pub mod error;
pub mod tolerance;

pub use error::{TfError, TfResult};
