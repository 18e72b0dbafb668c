// crates/tf_mesh/src/geometry.rs

//! 四面体几何核心
//!
//! 提供纯函数形式的几何计算：
//! - 雅可比行列式 J = 6V（两种等价形式：直接行列式 / 三重积）
//! - 线性形函数梯度（四个梯度之和恒为零向量）
//! - 三角形面积与外法向
//!
//! 所有函数无内部状态，可在热循环中直接内联调用。
//! 既支持"坐标数组 + 四个索引"的形式，也支持"预先算好的棱向量"形式。

use glam::DVec3;
use tf_foundation::{TfError, TfResult};

/// 四面体局部边编号：6 条棱各自的两个局部节点
///
/// 顺序与对偶面法向、边积分的遍历顺序一致，不可改动。
pub const LOCAL_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];

/// 单个四面体的几何量集合
#[derive(Debug, Clone)]
pub struct ElementGeometry {
    /// 从节点 0 出发的三条棱向量 (b-a, c-a, d-a)
    pub ba: DVec3,
    pub ca: DVec3,
    pub da: DVec3,
    /// 雅可比行列式 J = 6V，保证 > 0
    pub jacobian: f64,
    /// 四个线性形函数的梯度
    pub grad: [DVec3; 4],
}

/// 由三条棱向量计算雅可比行列式（三重积形式）
///
/// J = (b-a) · ((c-a) × (d-a)) = 6V
#[inline]
pub fn jacobian_from_edges(ba: DVec3, ca: DVec3, da: DVec3) -> f64 {
    ba.dot(ca.cross(da))
}

/// 由四个顶点直接计算雅可比行列式（行列式形式）
///
/// 与 [`jacobian_from_edges`] 在浮点精度内等价，用于交叉验证。
#[inline]
pub fn jacobian_from_points(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    let ba = b - a;
    let ca = c - a;
    let da = d - a;
    // 3x3 行列式按第一行展开
    ba.x * (ca.y * da.z - ca.z * da.y) - ba.y * (ca.x * da.z - ca.z * da.x)
        + ba.z * (ca.x * da.y - ca.y * da.x)
}

/// 由棱向量和雅可比计算四个线性形函数梯度
///
/// grad[1] = (c-a)×(d-a)/J, grad[2] = (d-a)×(b-a)/J, grad[3] = (b-a)×(c-a)/J,
/// grad[0] = -(grad[1]+grad[2]+grad[3])（一致性条件：四者之和为零）
#[inline]
pub fn shape_gradients(ba: DVec3, ca: DVec3, da: DVec3, jacobian: f64) -> [DVec3; 4] {
    let g1 = ca.cross(da) / jacobian;
    let g2 = da.cross(ba) / jacobian;
    let g3 = ba.cross(ca) / jacobian;
    [-(g1 + g2 + g3), g1, g2, g3]
}

/// 由坐标数组和单元连接表计算一个单元的完整几何量
///
/// 雅可比非正视为致命错误（网格翻转或退化）。
pub fn element_geometry(
    coord: &[DVec3],
    nodes: [usize; 4],
    element: usize,
) -> TfResult<ElementGeometry> {
    let a = coord[nodes[0]];
    let ba = coord[nodes[1]] - a;
    let ca = coord[nodes[2]] - a;
    let da = coord[nodes[3]] - a;
    let jacobian = jacobian_from_edges(ba, ca, da);
    if jacobian <= 0.0 {
        return Err(TfError::DegenerateElement { element, jacobian });
    }
    let grad = shape_gradients(ba, ca, da, jacobian);
    Ok(ElementGeometry {
        ba,
        ca,
        da,
        jacobian,
        grad,
    })
}

/// 三角形面积
#[inline]
pub fn triangle_area(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    0.5 * (b - a).cross(c - a).length()
}

/// 三角形单位法向（按节点顺序的右手法则方向）
///
/// 退化三角形（面积为零）返回 `None`。
#[inline]
pub fn triangle_normal(a: DVec3, b: DVec3, c: DVec3) -> Option<DVec3> {
    let n = (b - a).cross(c - a);
    let len = n.length();
    if len <= f64::EPSILON {
        None
    } else {
        Some(n / len)
    }
}

/// 四面体中心
#[inline]
pub fn tet_centroid(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> DVec3 {
    0.25 * (a + b + c + d)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 简单线性同余伪随机数，避免引入随机数依赖
    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn next_vec(&mut self) -> DVec3 {
            DVec3::new(self.next_f64(), self.next_f64(), self.next_f64())
        }
    }

    /// 参考四面体: 顶点在原点和三个单位坐标轴上，V = 1/6, J = 1
    fn reference_tet() -> [DVec3; 4] {
        [
            DVec3::ZERO,
            DVec3::X,
            DVec3::Y,
            DVec3::Z,
        ]
    }

    #[test]
    fn test_reference_jacobian() {
        let [a, b, c, d] = reference_tet();
        let j = jacobian_from_points(a, b, c, d);
        assert!((j - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_jacobian_two_forms_agree() {
        let mut rng = Lcg(42);
        for _ in 0..100 {
            let a = rng.next_vec();
            let b = a + rng.next_vec();
            let c = a + rng.next_vec();
            let d = a + rng.next_vec();
            let j1 = jacobian_from_points(a, b, c, d);
            let j2 = jacobian_from_edges(b - a, c - a, d - a);
            assert!((j1 - j2).abs() <= 1e-12 * j1.abs().max(1.0));
        }
    }

    #[test]
    fn test_shape_gradients_sum_to_zero() {
        let mut rng = Lcg(7);
        for _ in 0..100 {
            let a = rng.next_vec();
            let ba = rng.next_vec() + DVec3::X;
            let ca = rng.next_vec() + DVec3::Y;
            let da = rng.next_vec() + DVec3::Z;
            let j = jacobian_from_edges(ba, ca, da);
            if j <= 1e-6 {
                continue;
            }
            let g = shape_gradients(ba, ca, da, j);
            let sum = g[0] + g[1] + g[2] + g[3];
            assert!(sum.length() < 1e-12);
        }
    }

    #[test]
    fn test_gradient_interpolation_property() {
        // 线性场 f(x) = k·x 在单元内的梯度应被形函数梯度精确重构
        let [a, b, c, d] = reference_tet();
        let k = DVec3::new(1.5, -2.0, 0.5);
        let f = [k.dot(a), k.dot(b), k.dot(c), k.dot(d)];
        let geo = element_geometry(&[a, b, c, d], [0, 1, 2, 3], 0).unwrap();
        let mut grad = DVec3::ZERO;
        for i in 0..4 {
            grad += f[i] * geo.grad[i];
        }
        assert!((grad - k).length() < 1e-13);
    }

    #[test]
    fn test_degenerate_element_rejected() {
        // 四点共面
        let coord = [
            DVec3::ZERO,
            DVec3::X,
            DVec3::Y,
            DVec3::new(1.0, 1.0, 0.0),
        ];
        assert!(element_geometry(&coord, [0, 1, 2, 3], 5).is_err());
    }

    #[test]
    fn test_triangle_area_normal() {
        let a = DVec3::ZERO;
        let b = DVec3::X;
        let c = DVec3::Y;
        assert!((triangle_area(a, b, c) - 0.5).abs() < 1e-14);
        let n = triangle_normal(a, b, c).unwrap();
        assert!((n - DVec3::Z).length() < 1e-14);
    }
}
