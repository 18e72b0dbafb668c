// crates/tf_physics/src/reconstruction.rs

//! 梯度重构与 MUSCL 边重构
//!
//! - 节点梯度：单元梯度按 J/24 权重散布到四个节点，再除以
//!   节点控制体积（分布式场景下体积与梯度都要先跨分区合并）
//! - MUSCL：沿边的二阶重构，van Albada 型对称限制器，
//!   带密度/内能正性回退——回退被破坏时求解器在激波附近发散。

use glam::DVec3;
use tf_foundation::tolerance::MUSCL_EPS;
use tf_foundation::TfResult;
use tf_mesh::{DerivedConnectivity, TetMesh};

use crate::fields::Fields;

/// MUSCL 三阶插值常数
const MUSCL_CONST: f64 = 1.0 / 3.0;

/// 计算所有节点的各分量梯度
///
/// 返回 `nnode × ncomp` 的梯度数组。纯局部计算；
/// 分区边界节点的梯度只含本分区单元的部分贡献，
/// 调用方负责在使用前跨分区求和并除以合并后的节点体积。
pub fn nodal_gradients_partial(
    mesh: &TetMesh,
    u: &Fields,
) -> TfResult<Vec<Vec<DVec3>>> {
    let ncomp = u.nprop();
    let mut grad = vec![vec![DVec3::ZERO; ncomp]; mesh.nnode()];
    for e in 0..mesh.nelem() {
        let geo = mesh.element_geometry(e)?;
        let nodes = mesh.inpoel[e];
        let j24 = geo.jacobian / 24.0;
        for c in 0..ncomp {
            // 单元内梯度 = Σ_a u_a ∇N_a
            let mut ge = DVec3::ZERO;
            for a in 0..4 {
                ge += u.get(nodes[a], c) * geo.grad[a];
            }
            for &n in &nodes {
                grad[n][c] += j24 * ge;
            }
        }
    }
    Ok(grad)
}

/// 部分梯度除以节点体积得到最终节点梯度（串行便捷函数）
pub fn nodal_gradients(
    mesh: &TetMesh,
    derived: &DerivedConnectivity,
    u: &Fields,
) -> TfResult<Vec<Vec<DVec3>>> {
    let mut grad = nodal_gradients_partial(mesh, u)?;
    for (p, g) in grad.iter_mut().enumerate() {
        let vol = derived.nodal_volume[p];
        for gc in g.iter_mut() {
            *gc /= vol;
        }
    }
    Ok(grad)
}

/// 沿一条边的 MUSCL 重构
///
/// `ls`/`rs` 传入两端节点状态，就地改写为外推到边中点的左右状态。
/// `edge` 为左端指向右端的坐标差，`grad_l`/`grad_r` 为两端节点梯度。
/// `guard` 列出正性保护的分量（密度、总能）：任一保护分量的原值
/// 小于其重构增量时整侧回退为一阶（原值不动）。
pub fn muscl(
    ls: &mut [f64],
    rs: &mut [f64],
    grad_l: &[DVec3],
    grad_r: &[DVec3],
    edge: DVec3,
    guard: &[usize],
) {
    let ncomp = ls.len();
    let mut delta1 = vec![0.0; ncomp];
    let mut delta3 = vec![0.0; ncomp];
    let mut url = ls.to_vec();
    let mut urr = rs.to_vec();

    for c in 0..ncomp {
        let delta2 = rs[c] - ls[c];
        delta1[c] = 2.0 * grad_l[c].dot(edge) - delta2;
        delta3[c] = 2.0 * grad_r[c].dot(edge) - delta2;

        // van Albada 型对称限制
        let sl = (2.0 * delta1[c] * delta2 + MUSCL_EPS)
            / (delta1[c] * delta1[c] + delta2 * delta2 + MUSCL_EPS);
        let sr = (2.0 * delta3[c] * delta2 + MUSCL_EPS)
            / (delta3[c] * delta3[c] + delta2 * delta2 + MUSCL_EPS);
        let sl = sl.max(0.0);
        let sr = sr.max(0.0);

        url[c] += 0.25 * sl * (delta1[c] * (1.0 - MUSCL_CONST * sl) + delta2 * (1.0 + MUSCL_CONST * sl));
        urr[c] -= 0.25 * sr * (delta3[c] * (1.0 - MUSCL_CONST * sr) + delta2 * (1.0 + MUSCL_CONST * sr));
    }

    // 正性回退: 保护分量的原值被增量超过时整侧退回一阶
    let left_bad = guard.iter().any(|&c| ls[c] < delta1[c]);
    let right_bad = guard.iter().any(|&c| rs[c] < -delta3[c]);
    if !left_bad {
        ls.copy_from_slice(&url);
    }
    if !right_bad {
        rs.copy_from_slice(&urr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_mesh::TetMesh;

    #[test]
    fn test_muscl_identity_on_uniform_state() {
        let mut ls = [1.0, 0.5];
        let mut rs = [1.0, 0.5];
        let zero = [DVec3::ZERO, DVec3::ZERO];
        muscl(&mut ls, &mut rs, &zero, &zero, DVec3::X, &[0]);
        assert_eq!(ls, [1.0, 0.5]);
        assert_eq!(rs, [1.0, 0.5]);
    }

    #[test]
    fn test_muscl_second_order_on_linear_field() {
        // 线性场 u = x: 节点梯度精确, 重构应恰好落在边中点值
        let mut ls = [0.0];
        let mut rs = [1.0];
        let g = [DVec3::X];
        muscl(&mut ls, &mut rs, &g, &g, DVec3::X, &[]);
        assert!((ls[0] - 0.5).abs() < 1e-9);
        assert!((rs[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_muscl_positivity_fallback() {
        // 左侧密度很小, 大梯度会把重构值推成负 → 整侧回退
        let mut ls = [1.0e-6];
        let mut rs = [1.0];
        let gl = [DVec3::X * 10.0];
        let gr = [DVec3::ZERO];
        muscl(&mut ls, &mut rs, &gl, &gr, DVec3::X, &[0]);
        assert_eq!(ls[0], 1.0e-6);
    }

    #[test]
    fn test_nodal_gradients_linear_exact() {
        // 线性场的节点梯度应精确（Green-Gauss 对线性场无误差）
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let gid: Vec<usize> = (0..mesh.nnode()).collect();
        let derived = DerivedConnectivity::build(&mesh, &gid).unwrap();
        let k = DVec3::new(2.0, -1.0, 0.5);
        let mut u = Fields::new(mesh.nnode(), 1);
        for p in 0..mesh.nnode() {
            u.set(p, 0, k.dot(mesh.coord[p]));
        }
        let grad = nodal_gradients(&mesh, &derived, &u).unwrap();
        for g in &grad {
            assert!((g[0] - k).length() < 1e-11, "节点梯度 {:?} != {k:?}", g[0]);
        }
    }
}
