// crates/tf_physics/src/limiter/vertex_based.rs

//! 顶点型限制器（Kuzmin, P1）
//!
//! 与 Superbee 的区别在于允许界按顶点取：每个顶点的上下界取
//! 共享该顶点的全部单元均值的最小/最大，因此相邻单元在公共
//! 顶点处看到一致的界，模板比面邻居更宽，限制更温和。

use tf_foundation::TfResult;

use crate::basis;
use crate::fields::Fields;
use crate::limiter::{mean, scale_linear_dofs, LimiterContext, SlopeLimiter};

const DIFF_EPS: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct VertexBasedLimiter;

const VERTEX_REF: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

impl SlopeLimiter for VertexBasedLimiter {
    fn name(&self) -> &'static str {
        "VertexBased-P1"
    }

    fn limit(&self, ctx: &LimiterContext, u: &mut Fields) -> TfResult<()> {
        if ctx.ndof == 1 {
            return Ok(());
        }
        let ndof = ctx.ndof;
        for e in 0..ctx.mesh.nelem() {
            let nodes = ctx.mesh.inpoel[e];
            for c in 0..ctx.ncomp {
                let ubar = mean(u, e, c, ndof);
                let mut phi = 1.0f64;

                for (a, v) in VERTEX_REF.iter().enumerate() {
                    // 该顶点周围全部单元均值的包络
                    let mut umin = ubar;
                    let mut umax = ubar;
                    for &nb in &ctx.esup[nodes[a]] {
                        let m = mean(u, nb, c, ndof);
                        umin = umin.min(m);
                        umax = umax.max(m);
                    }

                    let b = basis::eval_basis(ndof, v[0], v[1], v[2]);
                    let uv: f64 = (0..ndof).map(|i| u.get(e, c * ndof + i) * b[i]).sum();
                    let diff = uv - ubar;
                    let phi_v = if diff > DIFF_EPS {
                        ((umax - ubar) / diff).min(1.0)
                    } else if diff < -DIFF_EPS {
                        ((umin - ubar) / diff).min(1.0)
                    } else {
                        1.0
                    };
                    phi = phi.min(phi_v.max(0.0));
                }
                scale_linear_dofs(u, e, c, ndof, phi);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::tests_common::{limiter_bounds_check, spike_setup};

    #[test]
    fn test_vertex_based_bounds_spike() {
        let (mesh, faces, esup, mut u, ncomp) = spike_setup();
        let ctx = LimiterContext {
            mesh: &mesh,
            faces: &faces,
            esup: &esup,
            ndof: 4,
            ncomp,
        };
        VertexBasedLimiter.limit(&ctx, &mut u).unwrap();
        limiter_bounds_check(&ctx, &u);
    }

    #[test]
    fn test_vertex_based_inactive_on_smooth_data() {
        // 微小斜率不触发限制（φ = 1 恒成立）
        let (mesh, faces, esup, _, ncomp) = spike_setup();
        let mut u = Fields::new(mesh.nelem(), 4);
        for e in 0..mesh.nelem() {
            u.set(e, 0, 1.0);
            u.set(e, 1, 1.0e-13);
        }
        let before = u.clone();
        let ctx = LimiterContext {
            mesh: &mesh,
            faces: &faces,
            esup: &esup,
            ndof: 4,
            ncomp,
        };
        VertexBasedLimiter.limit(&ctx, &mut u).unwrap();
        assert_eq!(u, before);
    }
}
