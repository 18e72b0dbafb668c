// crates/tf_mesh/src/derived.rs

//! 派生连接关系
//!
//! 从单元-节点连接表一次性构建边/点为中心格式所需的全部拓扑：
//! - `esup`: 点周单元
//! - `psup`: 点周点
//! - 规范有向边表（方向由全局编号决定：小编号 → 大编号）
//! - 每条边的对偶面法向（含面积权重）
//! - 节点控制体积（单元体积按 J/24 分摊到四个节点）
//!
//! 规范边方向规则在所有共享该边的分区上必须一致，
//! 因此以全局编号而非局部编号定向。

use std::collections::{BTreeMap, HashMap};

use glam::DVec3;
use tf_foundation::TfResult;

use crate::geometry::LOCAL_EDGES;
use crate::mesh::TetMesh;

/// 网格派生拓扑与几何量
#[derive(Debug, Clone)]
pub struct DerivedConnectivity {
    /// 点周单元
    pub esup: Vec<Vec<usize>>,
    /// 点周点（升序，不含自身）
    pub psup: Vec<Vec<usize>>,
    /// 规范有向边 (p, q)，满足 gid\[p\] < gid\[q\]
    pub edges: Vec<[usize; 2]>,
    /// 无序局部节点对 (min, max) → 边编号
    pub edge_id: HashMap<(usize, usize), usize>,
    /// 每条边的对偶面法向，方向 p → q，模长为对偶面积
    pub dual_normal: Vec<DVec3>,
    /// 节点控制体积
    pub nodal_volume: Vec<f64>,
    /// 边集编号 → 该边集上的节点（升序去重）
    pub sideset_nodes: BTreeMap<usize, Vec<usize>>,
    /// (边集编号, 节点) → 面积加权单位法向
    pub boundary_normal: HashMap<(usize, usize), DVec3>,
}

impl DerivedConnectivity {
    /// 构建全部派生量
    ///
    /// `gid` 为局部节点到全局编号的映射；串行场景传恒等映射即可。
    pub fn build(mesh: &TetMesh, gid: &[usize]) -> TfResult<Self> {
        let nnode = mesh.nnode();

        // 点周单元
        let mut esup: Vec<Vec<usize>> = vec![Vec::new(); nnode];
        for (e, nodes) in mesh.inpoel.iter().enumerate() {
            for &n in nodes {
                esup[n].push(e);
            }
        }

        // 点周点：经由共享单元收集
        let mut psup: Vec<Vec<usize>> = vec![Vec::new(); nnode];
        for (p, elems) in esup.iter().enumerate() {
            let mut nb: Vec<usize> = elems
                .iter()
                .flat_map(|&e| mesh.inpoel[e].iter().copied())
                .filter(|&q| q != p)
                .collect();
            nb.sort_unstable();
            nb.dedup();
            psup[p] = nb;
        }

        // 规范有向边表
        let mut edges: Vec<[usize; 2]> = Vec::new();
        let mut edge_id: HashMap<(usize, usize), usize> = HashMap::new();
        for nodes in &mesh.inpoel {
            for le in &LOCAL_EDGES {
                let (p, q) = (nodes[le[0]], nodes[le[1]]);
                let key = (p.min(q), p.max(q));
                edge_id.entry(key).or_insert_with(|| {
                    // 方向由全局编号决定
                    let dir = if gid[p] < gid[q] { [p, q] } else { [q, p] };
                    edges.push(dir);
                    edges.len() - 1
                });
            }
        }

        // 对偶面法向与节点体积
        let mut dual_normal = vec![DVec3::ZERO; edges.len()];
        let mut nodal_volume = vec![0.0; nnode];
        for e in 0..mesh.nelem() {
            let nodes = mesh.inpoel[e];
            let geo = mesh.element_geometry(e)?;
            let j48 = geo.jacobian / 48.0;
            let j24 = geo.jacobian / 24.0;
            for &n in &nodes {
                nodal_volume[n] += j24;
            }
            for le in &LOCAL_EDGES {
                let (p, q) = (nodes[le[0]], nodes[le[1]]);
                let eid = edge_id[&(p.min(q), p.max(q))];
                // 贡献方向统一到规范方向 p→q（gid 升序）, 法向指向 q 一侧
                let s = if gid[p] < gid[q] { 1.0 } else { -1.0 };
                dual_normal[eid] += j48 * s * (geo.grad[le[1]] - geo.grad[le[0]]);
            }
        }

        // 边集节点与边界法向
        let mut sideset_nodes: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut bnorm_acc: HashMap<(usize, usize), DVec3> = HashMap::new();
        for tri in &mesh.btri {
            let [a, b, c] = tri.nodes;
            let n = (mesh.coord[b] - mesh.coord[a]).cross(mesh.coord[c] - mesh.coord[a]);
            // n 的模长为 2 倍面积，直接作为面积权重累加
            for &p in &tri.nodes {
                *bnorm_acc.entry((tri.sideset, p)).or_insert(DVec3::ZERO) += n;
                sideset_nodes.entry(tri.sideset).or_default().push(p);
            }
        }
        for nodes in sideset_nodes.values_mut() {
            nodes.sort_unstable();
            nodes.dedup();
        }
        let boundary_normal = bnorm_acc
            .into_iter()
            .filter_map(|(k, n)| {
                let len = n.length();
                (len > f64::EPSILON).then(|| (k, n / len))
            })
            .collect();

        Ok(Self {
            esup,
            psup,
            edges,
            edge_id,
            dual_normal,
            nodal_volume,
            sideset_nodes,
            boundary_normal,
        })
    }

    /// 边数
    #[inline]
    pub fn nedge(&self) -> usize {
        self.edges.len()
    }
}
