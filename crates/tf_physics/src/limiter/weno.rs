// crates/tf_physics/src/limiter/weno.rs

//! WENO 重构限制器（P1）
//!
//! 候选多项式取本单元梯度与各面邻居梯度（换算到本单元的
//! 自由度系数），按光滑度指示子加权混合：
//! ω̃_s = (ε + β_s)^-2，中心候选的权重再乘以 `cweight`。
//! 光滑区中心权重占优、解几乎不变；间断附近振荡候选的
//! β 大、权重坍缩，起到无振荡重构的作用。

use tf_foundation::tolerance::WENO_EPS;
use tf_foundation::TfResult;

use crate::fields::Fields;
use crate::limiter::{dofs_to_gradient, gradient_to_dofs, LimiterContext, SlopeLimiter};

#[derive(Debug, Clone)]
pub struct WenoLimiter {
    /// 中心候选的权重放大系数
    pub cweight: f64,
}

impl Default for WenoLimiter {
    fn default() -> Self {
        Self { cweight: 1000.0 }
    }
}

impl SlopeLimiter for WenoLimiter {
    fn name(&self) -> &'static str {
        "WENO-P1"
    }

    fn limit(&self, ctx: &LimiterContext, u: &mut Fields) -> TfResult<()> {
        if ctx.ndof == 1 {
            return Ok(());
        }
        let ndof = ctx.ndof;

        // 换算需要每个单元的几何量, 先一次性取好
        let geos: Vec<_> = (0..ctx.mesh.nelem())
            .map(|e| ctx.mesh.element_geometry(e))
            .collect::<TfResult<Vec<_>>>()?;

        // 先收集全部限制结果再写回, 避免读到邻居的已限制值
        let mut limited: Vec<(usize, usize, [f64; 3])> = Vec::new();

        for e in 0..ctx.mesh.nelem() {
            for c in 0..ctx.ncomp {
                // 候选 0: 本单元自身的线性自由度
                let own = [
                    u.get(e, c * ndof + 1),
                    u.get(e, c * ndof + 2),
                    u.get(e, c * ndof + 3),
                ];
                let mut candidates = vec![own];
                for nb in ctx.faces.esuel[e].iter().flatten() {
                    let nb_dofs = [
                        u.get(*nb, c * ndof + 1),
                        u.get(*nb, c * ndof + 2),
                        u.get(*nb, c * ndof + 3),
                    ];
                    // 邻居多项式的物理梯度换算到本单元的自由度系数
                    let g = dofs_to_gradient(&geos[*nb], nb_dofs);
                    candidates.push(gradient_to_dofs(&geos[e], g));
                }

                // 光滑度指示子: 物理梯度模方 × 体积^(2/3) 保持量纲一致
                let scale = (geos[e].jacobian / 6.0).powf(2.0 / 3.0);
                let mut wsum = 0.0;
                let mut mixed = [0.0; 3];
                for (s, cand) in candidates.iter().enumerate() {
                    let g = dofs_to_gradient(&geos[e], *cand);
                    let beta = g.length_squared() * scale;
                    let mut w = 1.0 / ((WENO_EPS + beta) * (WENO_EPS + beta));
                    if s == 0 {
                        w *= self.cweight;
                    }
                    wsum += w;
                    for i in 0..3 {
                        mixed[i] += w * cand[i];
                    }
                }
                for m in &mut mixed {
                    *m /= wsum;
                }
                limited.push((e, c, mixed));
            }
        }

        for (e, c, dofs) in limited {
            for i in 0..3 {
                u.set(e, c * ndof + 1 + i, dofs[i]);
            }
        }
        Ok(())
    }
}
