// crates/tf_physics/src/basis.rs

//! 单元多项式基与数值积分
//!
//! 参考四面体 (ξ,η,ζ ≥ 0, ξ+η+ζ ≤ 1) 上的 Dubiner 正交基：
//! B1 = 1, B2 = 2ξ+η+ζ-1, B3 = 3η+ζ-1, B4 = 4ζ-1。
//! 正交性使单元质量矩阵对角：diag = vol·[1, 1/10, 3/10, 3/5]。
//!
//! 配套提供四面体与三角形上的对称高斯积分点
//! （权重归一化到 1，积分值需乘以体积/面积）。

use glam::DVec3;
use tf_mesh::ElementGeometry;

/// P1 基的自由度数
pub const NDOF_P1: usize = 4;

/// 在参考坐标处求基函数值
pub fn eval_basis(ndof: usize, xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
    let mut b = Vec::with_capacity(ndof);
    b.push(1.0);
    if ndof > 1 {
        b.push(2.0 * xi + eta + zeta - 1.0);
        b.push(3.0 * eta + zeta - 1.0);
        b.push(4.0 * zeta - 1.0);
    }
    b
}

/// 对角质量矩阵 vol·[1, 1/10, 3/10, 3/5]
pub fn mass_diag(ndof: usize, vol: f64) -> Vec<f64> {
    const W: [f64; 4] = [1.0, 0.1, 0.3, 0.6];
    W[..ndof].iter().map(|w| w * vol).collect()
}

/// 基函数的物理空间梯度（P1 基在单元内为常量）
///
/// 参考坐标的物理梯度正是线性形函数梯度：
/// ∇ξ = ∇N1, ∇η = ∇N2, ∇ζ = ∇N3。
pub fn basis_gradients(ndof: usize, geo: &ElementGeometry) -> Vec<DVec3> {
    let mut g = Vec::with_capacity(ndof);
    g.push(DVec3::ZERO);
    if ndof > 1 {
        g.push(2.0 * geo.grad[1] + geo.grad[2] + geo.grad[3]);
        g.push(3.0 * geo.grad[2] + geo.grad[3]);
        g.push(4.0 * geo.grad[3]);
    }
    g
}

/// 物理点 → 参考坐标
///
/// `origin` 为单元节点 0 的坐标；线性映射下
/// ξ = ∇N1·(p - x0) 等三式直接给出参考坐标。
#[inline]
pub fn physical_to_reference(geo: &ElementGeometry, origin: DVec3, p: DVec3) -> [f64; 3] {
    let d = p - origin;
    [geo.grad[1].dot(d), geo.grad[2].dot(d), geo.grad[3].dot(d)]
}

/// 用自由度系数在参考点处重构一个分量的值
///
/// `dofs` 是该分量的 ndof 个系数。
#[inline]
pub fn eval_solution(dofs: &[f64], basis: &[f64]) -> f64 {
    dofs.iter().zip(basis).map(|(d, b)| d * b).sum()
}

/// 四面体积分点（参考坐标 + 归一化权重）
pub struct TetQuadrature {
    pub coords: Vec<[f64; 3]>,
    pub weights: Vec<f64>,
}

/// 按精度阶选择四面体积分规则
///
/// degree 1 → 1 点, degree 2 → 4 点, degree 3 → 5 点。
pub fn tet_quadrature(degree: usize) -> TetQuadrature {
    match degree {
        0 | 1 => TetQuadrature {
            coords: vec![[0.25, 0.25, 0.25]],
            weights: vec![1.0],
        },
        2 => {
            let a = 0.585_410_196_624_968_5;
            let b = 0.138_196_601_125_010_5;
            TetQuadrature {
                coords: vec![[a, b, b], [b, a, b], [b, b, a], [b, b, b]],
                weights: vec![0.25; 4],
            }
        }
        _ => {
            let s = 1.0 / 6.0;
            TetQuadrature {
                coords: vec![
                    [0.25, 0.25, 0.25],
                    [0.5, s, s],
                    [s, 0.5, s],
                    [s, s, 0.5],
                    [s, s, s],
                ],
                weights: vec![-0.8, 0.45, 0.45, 0.45, 0.45],
            }
        }
    }
}

/// 三角形积分点（重心坐标前两个分量 + 归一化权重）
pub struct TriQuadrature {
    pub coords: Vec<[f64; 2]>,
    pub weights: Vec<f64>,
}

/// degree 1 → 1 点, 更高 → 3 点（degree 2 精确）
pub fn tri_quadrature(degree: usize) -> TriQuadrature {
    if degree <= 1 {
        TriQuadrature {
            coords: vec![[1.0 / 3.0, 1.0 / 3.0]],
            weights: vec![1.0],
        }
    } else {
        let (a, b) = (2.0 / 3.0, 1.0 / 6.0);
        TriQuadrature {
            coords: vec![[a, b], [b, a], [b, b]],
            weights: vec![1.0 / 3.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_mesh::geometry;

    #[test]
    fn test_quadrature_weights_normalized() {
        for d in 0..4 {
            let q = tet_quadrature(d);
            let sum: f64 = q.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-14);
        }
        for d in 0..3 {
            let q = tri_quadrature(d);
            let sum: f64 = q.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_basis_orthogonality_via_quadrature() {
        // 4 点规则对二次多项式精确, 足以验证 P1 基两两正交
        let q = tet_quadrature(2);
        for i in 0..NDOF_P1 {
            for j in 0..NDOF_P1 {
                let mut int = 0.0;
                for (p, w) in q.coords.iter().zip(&q.weights) {
                    let b = eval_basis(NDOF_P1, p[0], p[1], p[2]);
                    int += w * b[i] * b[j];
                }
                if i == j {
                    let expect = mass_diag(NDOF_P1, 1.0)[i];
                    assert!((int - expect).abs() < 1e-13, "质量对角 {i}: {int}");
                } else {
                    assert!(int.abs() < 1e-13, "基 {i},{j} 不正交: {int}");
                }
            }
        }
    }

    #[test]
    fn test_tet_rule_integrates_linear_exactly() {
        // ∫ξ 在参考四面体上 = 1/24, 归一化后 = 1/4
        let q = tet_quadrature(1);
        let int: f64 = q
            .coords
            .iter()
            .zip(&q.weights)
            .map(|(p, w)| w * p[0])
            .sum();
        assert!((int - 0.25).abs() < 1e-14);
    }

    #[test]
    fn test_physical_to_reference_round_trip() {
        let coord = [
            DVec3::new(0.2, 0.1, 0.0),
            DVec3::new(1.3, 0.2, 0.1),
            DVec3::new(0.3, 1.1, -0.2),
            DVec3::new(0.1, 0.4, 0.9),
        ];
        let geo = geometry::element_geometry(&coord, [0, 1, 2, 3], 0).unwrap();
        // 参考点 (0.2, 0.3, 0.1) 映射到物理再映射回来
        let (xi, eta, zeta) = (0.2, 0.3, 0.1);
        let p = coord[0] + xi * geo.ba + eta * geo.ca + zeta * geo.da;
        let r = physical_to_reference(&geo, coord[0], p);
        assert!((r[0] - xi).abs() < 1e-13);
        assert!((r[1] - eta).abs() < 1e-13);
        assert!((r[2] - zeta).abs() < 1e-13);
    }

    #[test]
    fn test_basis_gradient_matches_finite_difference() {
        let coord = [
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let geo = geometry::element_geometry(&coord, [0, 1, 2, 3], 0).unwrap();
        let g = basis_gradients(NDOF_P1, &geo);
        let h = 1e-6;
        let at = |p: DVec3| -> Vec<f64> {
            let r = physical_to_reference(&geo, coord[0], p);
            eval_basis(NDOF_P1, r[0], r[1], r[2])
        };
        let p0 = DVec3::new(0.2, 0.2, 0.2);
        for i in 1..NDOF_P1 {
            let fd = DVec3::new(
                (at(p0 + h * DVec3::X)[i] - at(p0)[i]) / h,
                (at(p0 + h * DVec3::Y)[i] - at(p0)[i]) / h,
                (at(p0 + h * DVec3::Z)[i] - at(p0)[i]) / h,
            );
            assert!((fd - g[i]).length() < 1e-5);
        }
    }
}
