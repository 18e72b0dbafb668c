// crates/tf_physics/src/linear_algebra/mod.rs

//! 稀疏线性代数：CSR 矩阵与分布式共轭梯度

pub mod cg;
pub mod csr;

pub use cg::{solve, solve_serial, CgConfig, CgStats};
pub use csr::CsrMatrix;
