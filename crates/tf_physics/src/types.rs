// crates/tf_physics/src/types.rs

//! 求解配置
//!
//! 启动时构造一次、之后只读的配置结构，显式传引用给需要它的
//! 组件，任何组件都不得在初始化后修改配置。
//! `validate` 在时间推进开始前一次性检测全部配置错误。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tf_foundation::{TfError, TfResult};

use crate::eos::Material;

/// 单元梯度限制器选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimiterKind {
    /// Superbee（P1），最压缩
    SuperbeeP1,
    /// 顶点型 Kuzmin 限制器（P1）
    VertexBasedP1,
    /// WENO 加权重构（P1）
    WenoP1,
}

/// 点格式的残差装配路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeKind {
    /// 两阶段单元-节点格式（Lax-Wendroff 半步预测）
    TwoStage,
    /// 边格式: 节点梯度 + MUSCL 重构 + 黎曼通量
    EdgeMuscl,
}

/// 数值通量选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluxKind {
    /// Rusanov（局部 Lax-Friedrichs），最耗散但最稳健
    Rusanov,
    /// AUSM 类压力/对流分裂通量
    Ausm,
}

/// 多材料压力松弛模式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PrelaxMode {
    /// 不做压力松弛
    Off,
    /// 有限速率松弛，松弛时标 t = max_k(ct·dx/a_k)
    FiniteRate {
        /// 时标系数 ct
        ct: f64,
    },
    /// 瞬时松弛：每步结束后直接把各材料压力拉到混合压力
    Instantaneous,
}

/// 驻点区域: 区域内节点的速度每步被清零
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagnationZone {
    pub center: DVec3,
    pub radius: f64,
}

/// 远场状态（亚/超音速进出口分类用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FarfieldState {
    pub density: f64,
    pub pressure: f64,
    pub velocity: DVec3,
}

/// 盒形初始条件 / 能量沉积源
///
/// 在指定长方体区域内沉积给定能量，能量锋面以恒定速度沿 z 向
/// 推进，锋面处按半正弦分布释放。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxIc {
    /// [xmin, xmax, ymin, ymax, zmin, zmax]
    pub bounds: [f64; 6],
    /// 沉积总能量；选择能量沉积算例时必须给定
    pub energy_content: Option<f64>,
    /// 能量锋面推进速度
    pub front_speed: f64,
    /// 锋面宽度
    pub front_width: f64,
}

impl BoxIc {
    /// 盒体体积
    pub fn volume(&self) -> f64 {
        let b = self.bounds;
        (b[1] - b[0]) * (b[3] - b[2]) * (b[5] - b[4])
    }

    /// 点是否在盒内
    pub fn contains(&self, p: DVec3) -> bool {
        let b = self.bounds;
        p.x > b[0] && p.x < b[1] && p.y > b[2] && p.y < b[3] && p.z > b[4] && p.z < b[5]
    }
}

/// 求解配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// CFL 数
    pub cfl: f64,
    /// 点格式装配路径
    pub scheme: SchemeKind,
    /// 各材料状态方程参数；单材料体系只用第一个
    pub materials: Vec<Material>,
    /// 单元格式的梯度限制器
    pub limiter: LimiterKind,
    /// 数值通量
    pub flux: FluxKind,
    /// 多材料压力松弛
    pub prelax: PrelaxMode,
    /// 界面锐化参数（`None` 关闭）
    pub intsharp: Option<f64>,
    /// 远场状态（远场边界条件需要）
    pub farfield: Option<FarfieldState>,
    /// 亚音速出口背压（亚音速出口边界条件需要）
    pub outlet_pressure: Option<f64>,
    /// 驻点区域列表
    pub stagnation: Vec<StagnationZone>,
    /// 盒形初始条件 / 能量源
    pub box_ic: Option<BoxIc>,
    /// FCT 质量扩散系数 ctau ∈ [0,1]
    pub ctau: f64,
    /// 点格式是否启用 FCT 限制
    pub fct: bool,
    /// 单元格式每分量自由度数（1=P0, 4=P1）
    pub ndof: usize,
    /// 固定时间步长（`None` 时按 CFL 自适应）
    pub dt_fixed: Option<f64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            cfl: 0.5,
            scheme: SchemeKind::TwoStage,
            materials: vec![Material::ideal_gas(1.4)],
            limiter: LimiterKind::VertexBasedP1,
            flux: FluxKind::Rusanov,
            prelax: PrelaxMode::Off,
            intsharp: None,
            farfield: None,
            outlet_pressure: None,
            stagnation: Vec::new(),
            box_ic: None,
            ctau: 1.0,
            fct: true,
            ndof: 1,
            dt_fixed: None,
        }
    }
}

impl FlowConfig {
    /// 配置完整性检查，推进开始前调用一次
    pub fn validate(&self) -> TfResult<()> {
        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return Err(TfError::config(format!("CFL 数 {} 超出 (0, 1]", self.cfl)));
        }
        if self.materials.is_empty() {
            return Err(TfError::config("至少需要一种材料"));
        }
        for (k, m) in self.materials.iter().enumerate() {
            if m.gamma <= 1.0 {
                return Err(TfError::config(format!(
                    "材料 {k} 的比热比 γ={} 必须大于 1",
                    m.gamma
                )));
            }
            if m.pstiff < 0.0 || m.cv <= 0.0 {
                return Err(TfError::config(format!("材料 {k} 的 p∞/cv 非法")));
            }
        }
        if !(0.0..=1.0).contains(&self.ctau) {
            return Err(TfError::config(format!("ctau {} 超出 [0, 1]", self.ctau)));
        }
        if self.ndof != 1 && self.ndof != 4 {
            return Err(TfError::config(format!("自由度数 {} 只支持 1 或 4", self.ndof)));
        }
        if let PrelaxMode::FiniteRate { ct } = self.prelax {
            if ct <= 0.0 {
                return Err(TfError::config("有限速率压力松弛的时标系数必须为正"));
            }
        }
        if let Some(b) = &self.box_ic {
            for d in 0..3 {
                if b.bounds[2 * d] >= b.bounds[2 * d + 1] {
                    return Err(TfError::config("盒形区域上下界颠倒"));
                }
            }
            match b.energy_content {
                Some(e) if e > 0.0 => {}
                _ => {
                    return Err(TfError::config(
                        "选择了能量沉积算例但未给定正的盒内能量含量",
                    ))
                }
            }
        }
        if let Some(i) = self.intsharp {
            if i <= 0.0 {
                return Err(TfError::config("界面锐化参数必须为正"));
            }
        }
        if let Some(p) = self.outlet_pressure {
            if p <= 0.0 {
                return Err(TfError::config("亚音速出口背压必须为正"));
            }
        }
        for (i, z) in self.stagnation.iter().enumerate() {
            if z.radius <= 0.0 {
                return Err(TfError::config(format!("驻点区域 {i} 的半径必须为正")));
            }
        }
        Ok(())
    }

    /// 材料数
    #[inline]
    pub fn nmat(&self) -> usize {
        self.materials.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert!(FlowConfig::default().validate().is_ok());
    }

    #[test]
    fn test_box_without_energy_rejected() {
        let cfg = FlowConfig {
            box_ic: Some(BoxIc {
                bounds: [0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
                energy_content: None,
                front_speed: 0.08,
                front_width: 0.1,
            }),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_cfl_rejected() {
        let cfg = FlowConfig {
            cfl: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_gamma_rejected() {
        let cfg = FlowConfig {
            materials: vec![Material::ideal_gas(0.9)],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
