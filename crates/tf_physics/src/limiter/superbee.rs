// crates/tf_physics/src/limiter/superbee.rs

//! Superbee 限制器（P1）
//!
//! 对每个分量：取面邻居单元均值的最小/最大作为允许界，
//! 在单元四个顶点处检查重构值，按 Superbee 限制函数求缩放系数，
//! 全部顶点取最小后缩放线性自由度。

use tf_foundation::TfResult;

use crate::basis;
use crate::fields::Fields;
use crate::limiter::{mean, scale_linear_dofs, LimiterContext, SlopeLimiter};

/// 重构偏差判零阈值
const DIFF_EPS: f64 = 1.0e-12;

#[derive(Debug, Clone)]
pub struct SuperbeeLimiter {
    /// 限制强度系数，1 为标准 Superbee，越小越耗散
    pub beta: f64,
}

impl Default for SuperbeeLimiter {
    fn default() -> Self {
        Self { beta: 1.0 }
    }
}

/// 顶点的参考坐标（与单元节点一一对应）
const VERTEX_REF: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

impl SlopeLimiter for SuperbeeLimiter {
    fn name(&self) -> &'static str {
        "Superbee-P1"
    }

    fn limit(&self, ctx: &LimiterContext, u: &mut Fields) -> TfResult<()> {
        if ctx.ndof == 1 {
            return Ok(());
        }
        let ndof = ctx.ndof;
        for e in 0..ctx.mesh.nelem() {
            for c in 0..ctx.ncomp {
                let ubar = mean(u, e, c, ndof);

                // 面邻居均值包络
                let mut umin = ubar;
                let mut umax = ubar;
                for nb in ctx.faces.esuel[e].iter().flatten() {
                    let m = mean(u, *nb, c, ndof);
                    umin = umin.min(m);
                    umax = umax.max(m);
                }

                // 顶点处的限制系数
                let mut phi = 1.0f64;
                for v in &VERTEX_REF {
                    let b = basis::eval_basis(ndof, v[0], v[1], v[2]);
                    let uv: f64 = (0..ndof).map(|i| u.get(e, c * ndof + i) * b[i]).sum();
                    let diff = uv - ubar;
                    let r = if diff > DIFF_EPS {
                        (umax - ubar) / (2.0 * diff)
                    } else if diff < -DIFF_EPS {
                        (umin - ubar) / (2.0 * diff)
                    } else {
                        1.0
                    };
                    // Superbee: φ = max(0, min(1, 2r), min(r, 2)), 封顶 1
                    let s = 0.0f64.max((2.0 * r).min(1.0)).max(r.min(2.0)).min(1.0);
                    phi = phi.min(self.beta * s).min(1.0);
                }
                scale_linear_dofs(u, e, c, ndof, phi.max(0.0));
            }
        }
        Ok(())
    }
}
