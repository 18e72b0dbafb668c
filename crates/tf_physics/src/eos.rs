// crates/tf_physics/src/eos.rs

//! 状态方程
//!
//! 刚性气体 (stiffened gas) 状态方程：
//! p = (γ-1)(ρE - ½ρ|v|²) - γ·p∞，p∞=0 时退化为理想气体。
//! 多材料形式以体积分数 α 缩放：输入为偏密度 αρ、偏总能 αρE，
//! 输出为偏压力 αp。
//!
//! 所有函数均为纯函数，按材料参数化；求解核心只消费、不定义
//! 状态方程本身。

use serde::{Deserialize, Serialize};

/// 刚性气体材料参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// 比热比 γ
    pub gamma: f64,
    /// 刚性压力 p∞（液体/固体相的可压缩性修正）
    pub pstiff: f64,
    /// 定容比热 cv
    pub cv: f64,
}

impl Material {
    /// 理想气体
    pub fn ideal_gas(gamma: f64) -> Self {
        Self {
            gamma,
            pstiff: 0.0,
            cv: 717.5,
        }
    }

    /// 偏压力 αp = (γ-1)(αρE - ½αρ|v|²) - α·γ·p∞
    ///
    /// 单材料调用时传 `alpha = 1`，`arho`/`arho_e` 即为 ρ/ρE。
    #[inline]
    pub fn pressure(&self, arho: f64, u: f64, v: f64, w: f64, arho_e: f64, alpha: f64) -> f64 {
        (self.gamma - 1.0) * (arho_e - 0.5 * arho * (u * u + v * v + w * w))
            - alpha * self.gamma * self.pstiff
    }

    /// 声速 a = √(γ(αp + α·p∞)/αρ)
    #[inline]
    pub fn soundspeed(&self, arho: f64, apr: f64, alpha: f64) -> f64 {
        let core = self.gamma * (apr + alpha * self.pstiff) / arho;
        core.max(0.0).sqrt()
    }

    /// 总能 ρE = (p + γ·p∞)/(γ-1) + ½ρ|v|²
    #[inline]
    pub fn total_energy(&self, rho: f64, u: f64, v: f64, w: f64, pr: f64) -> f64 {
        (pr + self.gamma * self.pstiff) / (self.gamma - 1.0)
            + 0.5 * rho * (u * u + v * v + w * w)
    }

    /// 由压力和温度反解密度 ρ = (p + p∞)/((γ-1)·cv·T)
    #[inline]
    pub fn density(&self, pr: f64, temperature: f64) -> f64 {
        (pr + self.pstiff) / ((self.gamma - 1.0) * self.cv * temperature)
    }

    /// 温度 T = (αρE - ½αρ|v|² - α·p∞)/(αρ·cv)
    #[inline]
    pub fn temperature(&self, arho: f64, u: f64, v: f64, w: f64, arho_e: f64, alpha: f64) -> f64 {
        (arho_e - 0.5 * arho * (u * u + v * v + w * w) - alpha * self.pstiff) / (arho * self.cv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_gas_round_trip() {
        let m = Material::ideal_gas(1.4);
        let (rho, u, v, w, pr) = (1.2, 10.0, -3.0, 0.5, 101325.0);
        let rho_e = m.total_energy(rho, u, v, w, pr);
        let back = m.pressure(rho, u, v, w, rho_e, 1.0);
        assert!((back - pr).abs() < 1e-9 * pr);
    }

    #[test]
    fn test_soundspeed_ideal() {
        let m = Material::ideal_gas(1.4);
        let a = m.soundspeed(1.0, 1.0, 1.0);
        assert!((a - 1.4f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn test_stiffened_water_positive_speed() {
        // 典型弱可压水参数
        let m = Material {
            gamma: 5.5,
            pstiff: 4.92e8,
            cv: 4186.0,
        };
        let rho = 1000.0;
        let pr = 101325.0;
        let a = m.soundspeed(rho, pr, 1.0);
        assert!(a > 1000.0 && a < 3000.0);
        let rho_e = m.total_energy(rho, 0.0, 0.0, 0.0, pr);
        assert!((m.pressure(rho, 0.0, 0.0, 0.0, rho_e, 1.0) - pr).abs() < 1e-6 * m.pstiff);
    }

    #[test]
    fn test_density_temperature_consistency() {
        let m = Material::ideal_gas(1.4);
        let (rho, pr) = (1.0, 1.0e5);
        let t = m.temperature(rho, 0.0, 0.0, 0.0, m.total_energy(rho, 0.0, 0.0, 0.0, pr), 1.0);
        let back = m.density(pr, t);
        assert!((back - rho).abs() < 1e-12);
    }
}
