// crates/tf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `TfError` 枚举和 `TfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类（对应求解器的错误分级）
//!
//! 1. **致命/不可恢复**: 退化单元（雅可比非正）、清理后负偏密度、
//!    CG 不收敛、输入尺寸错误 —— 整个分布式计算必须中止
//! 2. **配置错误**: 在时间推进开始前一次性检测并报告
//! 3. 物理越界（痕量材料体积分数/压力）不属于错误，由就地修正处理

use thiserror::Error;

/// 统一结果类型
pub type TfResult<T> = Result<T, TfError>;

/// TetraFlow 错误类型
#[derive(Error, Debug)]
pub enum TfError {
    // ========================================================================
    // 网格/几何错误
    // ========================================================================
    /// 退化单元：雅可比行列式非正（网格翻转或损坏）
    #[error("退化四面体单元: 单元 {element} 雅可比 J={jacobian:.6e} <= 0")]
    DegenerateElement {
        /// 本地单元索引
        element: usize,
        /// 雅可比行列式 (J = 6V)
        jacobian: f64,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    // ========================================================================
    // 物理状态错误
    // ========================================================================
    /// 痕量材料清理之后仍然出现负偏密度（算法无法修正，必须中止）
    #[error(
        "负偏密度: 单元 {element} 材料 {material} alpha*rho={partial_density:.6e} \
         (单元中心 [{x:.4}, {y:.4}, {z:.4}])"
    )]
    NegativePartialDensity {
        /// 本地单元索引
        element: usize,
        /// 材料编号
        material: usize,
        /// 偏密度 alpha_k * rho_k
        partial_density: f64,
        /// 单元中心坐标
        x: f64,
        y: f64,
        z: f64,
    },

    // ========================================================================
    // 求解器错误
    // ========================================================================
    /// 迭代求解器不收敛
    #[error("线性求解器不收敛: {iterations} 次迭代后残差 {residual:.6e} (容差 {tolerance:.6e})")]
    SolverDiverged {
        /// 已执行的迭代次数
        iterations: usize,
        /// 最终残差范数
        residual: f64,
        /// 收敛容差
        tolerance: f64,
    },

    /// 远端分区检测到致命错误，本分区协同中止
    #[error("分布式计算已中止: 分区 {rank} 报告: {reason}")]
    Aborted {
        /// 发起中止的分区号
        rank: usize,
        /// 中止原因
        reason: String,
    },

    /// 通信协议违例（同一轮次合并多次、计数超限等）
    #[error("通信协议错误: {message}")]
    Protocol {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 配置错误
    // ========================================================================
    /// 配置错误（在时间推进前一次性检测）
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },
}

impl TfError {
    /// 便捷构造：配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 便捷构造：无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 便捷构造：通信协议错误
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// 此错误是否为致命错误（需要广播到所有分区并中止整个计算）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DegenerateElement { .. }
                | Self::NegativePartialDensity { .. }
                | Self::SolverDiverged { .. }
                | Self::SizeMismatch { .. }
                | Self::Protocol { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let e = TfError::DegenerateElement {
            element: 3,
            jacobian: -1.0e-12,
        };
        assert!(e.is_fatal());

        let e = TfError::config("缺少盒形初始条件的能量含量");
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let e = TfError::SizeMismatch {
            name: "inpoel",
            expected: 8,
            actual: 7,
        };
        let msg = format!("{e}");
        assert!(msg.contains("inpoel"));
        assert!(msg.contains('8'));
    }
}
