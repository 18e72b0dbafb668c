// crates/tf_physics/src/limiter/mod.rs

//! 单元梯度限制器
//!
//! 三种可互换的 P1 限制策略，配置时选定一种，每步对全部单元
//! 统一施加：
//! - `SuperbeeLimiter`: 最压缩的经典限制函数
//! - `VertexBasedLimiter`: Kuzmin 顶点型限制器
//! - `WenoLimiter`: 加权本质无振荡重构
//!
//! 共同保证：限制只缩放线性自由度（均值分量不动，守恒自动成立），
//! 且限制后在单元节点处的取值不会超出近邻单元均值的包络
//! （WENO 按权重混合梯度，振荡抑制由光滑度权重保证）。

mod superbee;
mod vertex_based;
mod weno;

pub use superbee::SuperbeeLimiter;
pub use vertex_based::VertexBasedLimiter;
pub use weno::WenoLimiter;

use glam::DVec3;
use tf_foundation::TfResult;
use tf_mesh::{ElementGeometry, FaceConnectivity, TetMesh};

use crate::basis;
use crate::fields::Fields;
use crate::types::LimiterKind;

/// 限制器运行所需的网格上下文
pub struct LimiterContext<'a> {
    pub mesh: &'a TetMesh,
    pub faces: &'a FaceConnectivity,
    /// 点周单元（顶点型限制器用）
    pub esup: &'a [Vec<usize>],
    /// 每分量自由度数
    pub ndof: usize,
    /// 分量数
    pub ncomp: usize,
}

/// 斜率限制策略
pub trait SlopeLimiter: Send + Sync {
    fn name(&self) -> &'static str;

    /// 就地限制全部单元的线性自由度
    fn limit(&self, ctx: &LimiterContext, u: &mut Fields) -> TfResult<()>;
}

/// 按配置创建限制器
pub fn create_limiter(kind: LimiterKind) -> Box<dyn SlopeLimiter> {
    match kind {
        LimiterKind::SuperbeeP1 => Box::new(SuperbeeLimiter::default()),
        LimiterKind::VertexBasedP1 => Box::new(VertexBasedLimiter),
        LimiterKind::WenoP1 => Box::new(WenoLimiter::default()),
    }
}

/// 单元均值（B1 系数）
#[inline]
pub(crate) fn mean(u: &Fields, e: usize, c: usize, ndof: usize) -> f64 {
    u.get(e, c * ndof)
}

/// 在单元某个参考点处重构分量值
#[inline]
pub(crate) fn eval_at(u: &Fields, e: usize, c: usize, ndof: usize, b: &[f64]) -> f64 {
    (0..ndof).map(|i| u.get(e, c * ndof + i) * b[i]).sum()
}

/// 把线性自由度统一乘以 φ ∈ [0,1]
#[inline]
pub(crate) fn scale_linear_dofs(u: &mut Fields, e: usize, c: usize, ndof: usize, phi: f64) {
    for i in 1..ndof {
        let idx = c * ndof + i;
        let v = u.get(e, idx);
        u.set(e, idx, phi * v);
    }
}

/// 物理梯度 → P1 线性自由度系数
///
/// 解 c2·∇B2 + c3·∇B3 + c4·∇B4 = g 的 3×3 线性系统（Cramer 法）。
pub(crate) fn gradient_to_dofs(geo: &ElementGeometry, g: DVec3) -> [f64; 3] {
    let gb = basis::basis_gradients(basis::NDOF_P1, geo);
    let (b2, b3, b4) = (gb[1], gb[2], gb[3]);
    let det = b2.dot(b3.cross(b4));
    [
        g.dot(b3.cross(b4)) / det,
        g.dot(b4.cross(b2)) / det,
        g.dot(b2.cross(b3)) / det,
    ]
}

/// P1 线性自由度 → 物理梯度
pub(crate) fn dofs_to_gradient(geo: &ElementGeometry, c: [f64; 3]) -> DVec3 {
    let gb = basis::basis_gradients(basis::NDOF_P1, geo);
    c[0] * gb[1] + c[1] * gb[2] + c[2] * gb[3]
}

#[cfg(test)]
pub(crate) mod tests_common {
    use super::*;
    use tf_mesh::{DerivedConnectivity, TetMesh};

    /// 造一个带突刺的 P1 场: 单元 0 的线性自由度远超邻居均值包络
    pub fn spike_setup() -> (TetMesh, FaceConnectivity, Vec<Vec<usize>>, Fields, usize) {
        let mesh = TetMesh::box_mesh(2, 1, 1, 1.0, 1.0, 1.0).unwrap();
        let faces = FaceConnectivity::build(&mesh).unwrap();
        let gid: Vec<usize> = (0..mesh.nnode()).collect();
        let derived = DerivedConnectivity::build(&mesh, &gid).unwrap();
        let ncomp = 1;
        let ndof = 4;
        let mut u = Fields::new(mesh.nelem(), ncomp * ndof);
        for e in 0..mesh.nelem() {
            // 平缓变化的均值
            u.set(e, 0, 1.0 + 0.01 * e as f64);
        }
        // 突刺: 远超邻居包络的线性自由度
        u.set(0, 1, 5.0);
        u.set(0, 2, -3.0);
        u.set(0, 3, 2.0);
        (mesh, faces, derived.esup, u, ncomp)
    }

    /// 限制后单元顶点值必须落在顶点邻域单元均值包络内
    pub fn limiter_bounds_check(ctx: &LimiterContext, u: &Fields) {
        const VERTS: [[f64; 3]; 4] = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        for e in 0..ctx.mesh.nelem() {
            for c in 0..ctx.ncomp {
                // 顶点邻域均值包络（含自身）
                let mut lo = mean(u, e, c, ctx.ndof);
                let mut hi = lo;
                for &p in &ctx.mesh.inpoel[e] {
                    for &nb in &ctx.esup[p] {
                        let m = mean(u, nb, c, ctx.ndof);
                        lo = lo.min(m);
                        hi = hi.max(m);
                    }
                }
                for v in &VERTS {
                    let b = basis::eval_basis(ctx.ndof, v[0], v[1], v[2]);
                    let uv = eval_at(u, e, c, ctx.ndof, &b);
                    assert!(
                        uv >= lo - 1e-10 && uv <= hi + 1e-10,
                        "单元 {e} 分量 {c} 顶点值 {uv} 超出包络 [{lo}, {hi}]"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_mesh::geometry;

    #[test]
    fn test_gradient_dof_round_trip() {
        let coord = [
            DVec3::new(0.1, 0.0, 0.2),
            DVec3::new(1.1, 0.1, 0.0),
            DVec3::new(0.0, 0.9, 0.1),
            DVec3::new(0.2, 0.3, 1.2),
        ];
        let geo = geometry::element_geometry(&coord, [0, 1, 2, 3], 0).unwrap();
        let g = DVec3::new(1.0, -2.0, 0.5);
        let c = gradient_to_dofs(&geo, g);
        let back = dofs_to_gradient(&geo, c);
        assert!((back - g).length() < 1e-12);
    }
}
