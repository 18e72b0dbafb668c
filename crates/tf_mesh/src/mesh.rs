// crates/tf_mesh/src/mesh.rs

//! 四面体网格容器
//!
//! `TetMesh` 持有一个分区（或整体）网格的坐标、单元连接表和
//! 带边集编号的边界三角形。构造时做一次完整性校验，
//! 之后在时间推进期间保持只读。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tf_foundation::{TfError, TfResult};

use crate::geometry;

/// 边界三角形：三个节点（局部编号）加所属边集编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryTri {
    /// 三角形节点（外法向按右手法则指向域外）
    pub nodes: [usize; 3],
    /// 边集编号（边界条件按边集指派）
    pub sideset: usize,
}

/// 无结构四面体网格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TetMesh {
    /// 节点坐标
    pub coord: Vec<DVec3>,
    /// 单元-节点连接表，每单元四个局部节点编号
    pub inpoel: Vec<[usize; 4]>,
    /// 边界三角形
    pub btri: Vec<BoundaryTri>,
}

impl TetMesh {
    /// 构造网格并校验连接表
    ///
    /// 校验内容：所有连接表索引在界内，所有单元雅可比严格为正。
    pub fn new(
        coord: Vec<DVec3>,
        inpoel: Vec<[usize; 4]>,
        btri: Vec<BoundaryTri>,
    ) -> TfResult<Self> {
        let nnode = coord.len();
        for (e, nodes) in inpoel.iter().enumerate() {
            for &n in nodes {
                if n >= nnode {
                    return Err(TfError::IndexOutOfBounds {
                        index_type: "单元连接表节点",
                        index: n,
                        len: nnode,
                    });
                }
            }
            // 雅可比正定性检查，退化单元立即报错
            geometry::element_geometry(&coord, *nodes, e)?;
        }
        for tri in &btri {
            for &n in &tri.nodes {
                if n >= nnode {
                    return Err(TfError::IndexOutOfBounds {
                        index_type: "边界三角形节点",
                        index: n,
                        len: nnode,
                    });
                }
            }
        }
        Ok(Self {
            coord,
            inpoel,
            btri,
        })
    }

    /// 节点数
    #[inline]
    pub fn nnode(&self) -> usize {
        self.coord.len()
    }

    /// 单元数
    #[inline]
    pub fn nelem(&self) -> usize {
        self.inpoel.len()
    }

    /// 单元几何量
    #[inline]
    pub fn element_geometry(&self, e: usize) -> TfResult<geometry::ElementGeometry> {
        geometry::element_geometry(&self.coord, self.inpoel[e], e)
    }

    /// 单元中心
    #[inline]
    pub fn element_centroid(&self, e: usize) -> DVec3 {
        let n = self.inpoel[e];
        geometry::tet_centroid(
            self.coord[n[0]],
            self.coord[n[1]],
            self.coord[n[2]],
            self.coord[n[3]],
        )
    }

    /// 单元体积 V = J/6
    pub fn element_volume(&self, e: usize) -> TfResult<f64> {
        Ok(self.element_geometry(e)?.jacobian / 6.0)
    }

    /// 总体积
    pub fn total_volume(&self) -> TfResult<f64> {
        let mut v = 0.0;
        for e in 0..self.nelem() {
            v += self.element_volume(e)?;
        }
        Ok(v)
    }

    /// 构建规则剖分的长方体网格，每个六面体切成 6 个四面体
    ///
    /// 节点按 (i, j, k) 字典序编号，`nx/ny/nz` 为各方向六面体数。
    /// 六个外表面依次赋边集编号 0..=5（x-,x+,y-,y+,z-,z+）。
    /// 主要用于测试与算例初始化。
    pub fn box_mesh(
        nx: usize,
        ny: usize,
        nz: usize,
        lx: f64,
        ly: f64,
        lz: f64,
    ) -> TfResult<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(TfError::invalid_mesh("长方体网格每个方向至少一个单元"));
        }
        let (mx, my, mz) = (nx + 1, ny + 1, nz + 1);
        let node = |i: usize, j: usize, k: usize| -> usize { (k * my + j) * mx + i };

        let mut coord = Vec::with_capacity(mx * my * mz);
        for k in 0..mz {
            for j in 0..my {
                for i in 0..mx {
                    coord.push(DVec3::new(
                        lx * i as f64 / nx as f64,
                        ly * j as f64 / ny as f64,
                        lz * k as f64 / nz as f64,
                    ));
                }
            }
        }

        // 六面体 → 六个四面体的标准剖分（绕主对角线 v0-v6）
        const HEX_TETS: [[usize; 4]; 6] = [
            [0, 1, 2, 6],
            [0, 2, 3, 6],
            [0, 3, 7, 6],
            [0, 7, 4, 6],
            [0, 4, 5, 6],
            [0, 5, 1, 6],
        ];

        let mut inpoel = Vec::with_capacity(nx * ny * nz * 6);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let v = [
                        node(i, j, k),
                        node(i + 1, j, k),
                        node(i + 1, j + 1, k),
                        node(i, j + 1, k),
                        node(i, j, k + 1),
                        node(i + 1, j, k + 1),
                        node(i + 1, j + 1, k + 1),
                        node(i, j + 1, k + 1),
                    ];
                    for t in &HEX_TETS {
                        inpoel.push([v[t[0]], v[t[1]], v[t[2]], v[t[3]]]);
                    }
                }
            }
        }

        // 外表面三角形：每个矩形面切两个三角形，法向朝外
        let mut btri = Vec::new();
        let mut quad = |a: usize, b: usize, c: usize, d: usize, sideset: usize| {
            btri.push(BoundaryTri {
                nodes: [a, b, c],
                sideset,
            });
            btri.push(BoundaryTri {
                nodes: [a, c, d],
                sideset,
            });
        };
        for k in 0..nz {
            for j in 0..ny {
                // x- 面 (法向 -x)
                quad(
                    node(0, j, k),
                    node(0, j, k + 1),
                    node(0, j + 1, k + 1),
                    node(0, j + 1, k),
                    0,
                );
                // x+ 面 (法向 +x)
                quad(
                    node(nx, j, k),
                    node(nx, j + 1, k),
                    node(nx, j + 1, k + 1),
                    node(nx, j, k + 1),
                    1,
                );
            }
        }
        for k in 0..nz {
            for i in 0..nx {
                // y- 面
                quad(
                    node(i, 0, k),
                    node(i + 1, 0, k),
                    node(i + 1, 0, k + 1),
                    node(i, 0, k + 1),
                    2,
                );
                // y+ 面
                quad(
                    node(i, ny, k),
                    node(i, ny, k + 1),
                    node(i + 1, ny, k + 1),
                    node(i + 1, ny, k),
                    3,
                );
            }
        }
        for j in 0..ny {
            for i in 0..nx {
                // z- 面
                quad(
                    node(i, j, 0),
                    node(i, j + 1, 0),
                    node(i + 1, j + 1, 0),
                    node(i + 1, j, 0),
                    4,
                );
                // z+ 面
                quad(
                    node(i, j, nz),
                    node(i + 1, j, nz),
                    node(i + 1, j + 1, nz),
                    node(i, j + 1, nz),
                    5,
                );
            }
        }

        Self::new(coord, inpoel, btri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_mesh_counts() {
        let mesh = TetMesh::box_mesh(2, 2, 2, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(mesh.nnode(), 27);
        assert_eq!(mesh.nelem(), 48);
        // 6 个面，每面 2*2 个矩形，每矩形 2 个三角形
        assert_eq!(mesh.btri.len(), 48);
    }

    #[test]
    fn test_box_mesh_volume() {
        let mesh = TetMesh::box_mesh(3, 2, 4, 2.0, 1.0, 0.5).unwrap();
        let v = mesh.total_volume().unwrap();
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_boundary_normals_outward() {
        use crate::geometry::triangle_normal;
        let mesh = TetMesh::box_mesh(1, 1, 1, 1.0, 1.0, 1.0).unwrap();
        let center = DVec3::splat(0.5);
        for tri in &mesh.btri {
            let [a, b, c] = tri.nodes;
            let n = triangle_normal(mesh.coord[a], mesh.coord[b], mesh.coord[c]).unwrap();
            let face_center = (mesh.coord[a] + mesh.coord[b] + mesh.coord[c]) / 3.0;
            assert!(n.dot(face_center - center) > 0.0, "边集 {} 法向朝内", tri.sideset);
        }
    }

    #[test]
    fn test_invalid_index_rejected() {
        let coord = vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z];
        let res = TetMesh::new(coord, vec![[0, 1, 2, 9]], vec![]);
        assert!(res.is_err());
    }
}
