// crates/tf_mesh/src/faces.rs

//! 单元面连接关系
//!
//! 以单元为中心的格式需要按面遍历：每个内部面连接左右两个单元，
//! 每个边界面属于唯一的支撑单元并携带边集编号。
//! 内部面的左单元取编号较小者，法向从左指向右；
//! 边界面法向指向域外。

use std::collections::HashMap;

use glam::DVec3;
use tf_foundation::{TfError, TfResult};

use crate::geometry;
use crate::mesh::TetMesh;

/// 四面体的四个局部面（节点顺序使法向指向对面节点的反方向，即朝外）
pub const LOCAL_FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// 内部面
#[derive(Debug, Clone)]
pub struct InteriorFace {
    /// 左单元（编号较小）
    pub left: usize,
    /// 右单元
    pub right: usize,
    /// 面节点（局部编号）
    pub nodes: [usize; 3],
    /// 单位法向，从左单元指向右单元
    pub normal: DVec3,
    /// 面积
    pub area: f64,
    /// 面中心
    pub center: DVec3,
}

/// 边界面
#[derive(Debug, Clone)]
pub struct BoundaryFace {
    /// 支撑单元
    pub element: usize,
    /// 面节点（局部编号）
    pub nodes: [usize; 3],
    /// 单位外法向
    pub normal: DVec3,
    /// 面积
    pub area: f64,
    /// 面中心
    pub center: DVec3,
    /// 边集编号
    pub sideset: usize,
}

/// 面连接表
#[derive(Debug, Clone)]
pub struct FaceConnectivity {
    pub interior: Vec<InteriorFace>,
    pub boundary: Vec<BoundaryFace>,
    /// 单元的四个面邻居（`None` 表示边界面）
    pub esuel: Vec<[Option<usize>; 4]>,
}

impl FaceConnectivity {
    /// 从网格构建面连接表
    ///
    /// 每个网格面必须恰好出现一次（边界）或两次（内部）；
    /// 边界面必须在 `mesh.btri` 中登记了边集编号。
    pub fn build(mesh: &TetMesh) -> TfResult<Self> {
        // 无序节点三元组 → (单元, 局部面号) 列表
        let mut face_map: HashMap<[usize; 3], Vec<(usize, usize)>> = HashMap::new();
        for (e, nodes) in mesh.inpoel.iter().enumerate() {
            for (lf, f) in LOCAL_FACES.iter().enumerate() {
                let mut key = [nodes[f[0]], nodes[f[1]], nodes[f[2]]];
                key.sort_unstable();
                face_map.entry(key).or_default().push((e, lf));
            }
        }

        // 边界三角形的边集查询表
        let mut sideset_of: HashMap<[usize; 3], usize> = HashMap::new();
        for tri in &mesh.btri {
            let mut key = tri.nodes;
            key.sort_unstable();
            sideset_of.insert(key, tri.sideset);
        }

        let mut interior = Vec::new();
        let mut boundary = Vec::new();
        let mut esuel = vec![[None; 4]; mesh.nelem()];

        for (key, owners) in &face_map {
            match owners.as_slice() {
                [(e, lf)] => {
                    let Some(&sideset) = sideset_of.get(key) else {
                        return Err(TfError::invalid_mesh(format!(
                            "单元 {e} 的边界面 {key:?} 未登记边集编号"
                        )));
                    };
                    let f = LOCAL_FACES[*lf];
                    let n = mesh.inpoel[*e];
                    let (a, b, c) = (
                        mesh.coord[n[f[0]]],
                        mesh.coord[n[f[1]]],
                        mesh.coord[n[f[2]]],
                    );
                    let area = geometry::triangle_area(a, b, c);
                    let normal = geometry::triangle_normal(a, b, c).ok_or_else(|| {
                        TfError::invalid_mesh(format!("单元 {e} 存在退化边界面"))
                    })?;
                    boundary.push(BoundaryFace {
                        element: *e,
                        nodes: [n[f[0]], n[f[1]], n[f[2]]],
                        normal,
                        area,
                        center: (a + b + c) / 3.0,
                        sideset,
                    });
                }
                [(e1, lf1), (e2, lf2)] => {
                    // 左单元取编号较小者, 用其局部面的朝外方向作为面法向
                    let (le, llf, re, rlf) = if e1 < e2 {
                        (*e1, *lf1, *e2, *lf2)
                    } else {
                        (*e2, *lf2, *e1, *lf1)
                    };
                    let f = LOCAL_FACES[llf];
                    let n = mesh.inpoel[le];
                    let (a, b, c) = (
                        mesh.coord[n[f[0]]],
                        mesh.coord[n[f[1]]],
                        mesh.coord[n[f[2]]],
                    );
                    let area = geometry::triangle_area(a, b, c);
                    let normal = geometry::triangle_normal(a, b, c).ok_or_else(|| {
                        TfError::invalid_mesh(format!("单元 {le}/{re} 之间存在退化面"))
                    })?;
                    esuel[le][llf] = Some(re);
                    esuel[re][rlf] = Some(le);
                    interior.push(InteriorFace {
                        left: le,
                        right: re,
                        nodes: [n[f[0]], n[f[1]], n[f[2]]],
                        normal,
                        area,
                        center: (a + b + c) / 3.0,
                    });
                }
                _ => {
                    return Err(TfError::invalid_mesh(format!(
                        "面 {key:?} 被 {} 个单元共享",
                        owners.len()
                    )));
                }
            }
        }

        // 遍历顺序确定化（HashMap 迭代顺序不稳定）
        interior.sort_by_key(|f| (f.left, f.right));
        boundary.sort_by_key(|f| (f.element, f.nodes));

        Ok(Self {
            interior,
            boundary,
            esuel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_faces_outward() {
        // 参考四面体上每个局部面的法向应背离对面的节点
        let coord = [DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z];
        let opposite = [0usize, 1, 2, 3];
        for (lf, f) in LOCAL_FACES.iter().enumerate() {
            let n = geometry::triangle_normal(coord[f[0]], coord[f[1]], coord[f[2]]).unwrap();
            let fc = (coord[f[0]] + coord[f[1]] + coord[f[2]]) / 3.0;
            let away = fc - coord[opposite[lf]];
            assert!(n.dot(away) > 0.0, "局部面 {lf} 法向朝内");
        }
    }

    #[test]
    fn test_face_counts_box() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        let fc = FaceConnectivity::build(&mesh).unwrap();
        // 总面数守恒: 4*nelem = 2*内部 + 边界
        assert_eq!(4 * mesh.nelem(), 2 * fc.interior.len() + fc.boundary.len());
        assert_eq!(fc.boundary.len(), mesh.btri.len());
    }

    #[test]
    fn test_esuel_symmetric() {
        let mesh = TetMesh::box_mesh(2, 1, 1, 1.0, 1.0, 1.0).unwrap();
        let fc = FaceConnectivity::build(&mesh).unwrap();
        for (e, nbs) in fc.esuel.iter().enumerate() {
            for nb in nbs.iter().flatten() {
                assert!(fc.esuel[*nb].iter().flatten().any(|&x| x == e));
            }
        }
    }

    #[test]
    fn test_interior_normal_left_to_right() {
        let mesh = TetMesh::box_mesh(2, 1, 1, 1.0, 1.0, 1.0).unwrap();
        let fc = FaceConnectivity::build(&mesh).unwrap();
        for f in &fc.interior {
            assert!(f.left < f.right);
            let cl = mesh.element_centroid(f.left);
            let cr = mesh.element_centroid(f.right);
            assert!(f.normal.dot(cr - cl) > 0.0, "内部面法向未从左指向右");
        }
    }
}
