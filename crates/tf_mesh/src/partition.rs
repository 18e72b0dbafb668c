// crates/tf_mesh/src/partition.rs

//! 网格分块
//!
//! 把整体网格按单元连续区间切分为若干分块，每块持有：
//! - 自己的局部网格（紧致重编号后的坐标与连接表）
//! - 局部 ↔ 全局节点编号映射
//! - 节点通信映射：对端分区编号 → 双方共享的全局节点列表
//!
//! 边界三角形归属于包含其支撑单元的分块，保证边界积分不重复。
//! 共享节点的"所有权"判给共享分区中编号最小者，
//! 用于全局诊断量的去重求和。
//!
//! 单元为中心的格式用 [`CellChunk`]：本块单元之外再带一圈
//! 点邻接的幽灵单元，幽灵解每个阶段从所属分区同步，
//! 面通量与限制器模板因此在本块单元上与整体网格一致。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tf_foundation::{TfError, TfResult};

use crate::mesh::{BoundaryTri, TetMesh};

/// 一个分区的网格块
#[derive(Debug, Clone)]
pub struct MeshChunk {
    /// 分区编号
    pub rank: usize,
    /// 分区总数
    pub nparts: usize,
    /// 局部网格
    pub mesh: TetMesh,
    /// 局部节点 → 全局编号
    pub gid: Vec<usize>,
    /// 全局编号 → 局部节点
    pub lid: HashMap<usize, usize>,
    /// 对端分区编号 → 共享的全局节点（升序）
    pub node_comm: BTreeMap<usize, Vec<usize>>,
    /// 局部节点是否归本分区所有（共享节点判给编号最小的分区）
    pub owned: Vec<bool>,
}

impl MeshChunk {
    /// 把整体网格包装成单分区块（串行场景）
    pub fn serial(mesh: TetMesh) -> Self {
        let nnode = mesh.nnode();
        let gid: Vec<usize> = (0..nnode).collect();
        let lid = gid.iter().map(|&g| (g, g)).collect();
        Self {
            rank: 0,
            nparts: 1,
            mesh,
            gid,
            lid,
            node_comm: BTreeMap::new(),
            owned: vec![true; nnode],
        }
    }

    /// 本分区所有的节点数
    pub fn nowned(&self) -> usize {
        self.owned.iter().filter(|&&o| o).count()
    }
}

/// 按单元连续区间把整体网格切成 `nparts` 块
///
/// 区间划分尽量均衡（前 `nelem % nparts` 块各多一个单元）。
pub fn partition_contiguous(global: &TetMesh, nparts: usize) -> TfResult<Vec<MeshChunk>> {
    if nparts == 0 {
        return Err(TfError::config("分区数必须大于零"));
    }
    if nparts > global.nelem() {
        return Err(TfError::config(format!(
            "分区数 {} 超过单元数 {}",
            nparts,
            global.nelem()
        )));
    }

    // 单元区间
    let nelem = global.nelem();
    let base = nelem / nparts;
    let rem = nelem % nparts;
    let mut ranges = Vec::with_capacity(nparts);
    let mut start = 0;
    for r in 0..nparts {
        let len = base + usize::from(r < rem);
        ranges.push(start..start + len);
        start += len;
    }

    // 边界三角形 → 支撑单元（包含其全部三个节点的单元）
    let mut face_owner: HashMap<[usize; 3], usize> = HashMap::new();
    for (e, nodes) in global.inpoel.iter().enumerate() {
        const FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        for f in &FACES {
            let mut key = [nodes[f[0]], nodes[f[1]], nodes[f[2]]];
            key.sort_unstable();
            face_owner.insert(key, e);
        }
    }
    let elem_rank = |e: usize| -> usize {
        ranges
            .iter()
            .position(|r| r.contains(&e))
            .unwrap_or(nparts - 1)
    };

    // 每个全局节点被哪些分区使用
    let mut node_parts: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); global.nnode()];
    for (r, range) in ranges.iter().enumerate() {
        for e in range.clone() {
            for &n in &global.inpoel[e] {
                node_parts[n].insert(r);
            }
        }
    }

    let mut chunks = Vec::with_capacity(nparts);
    for (r, range) in ranges.iter().enumerate() {
        // 本块使用的全局节点（升序即为局部编号顺序）
        let mut gid: Vec<usize> = range
            .clone()
            .flat_map(|e| global.inpoel[e].iter().copied())
            .collect();
        gid.sort_unstable();
        gid.dedup();
        let lid: HashMap<usize, usize> = gid.iter().enumerate().map(|(l, &g)| (g, l)).collect();

        let coord = gid.iter().map(|&g| global.coord[g]).collect();
        let inpoel = range
            .clone()
            .map(|e| {
                let n = global.inpoel[e];
                [lid[&n[0]], lid[&n[1]], lid[&n[2]], lid[&n[3]]]
            })
            .collect();

        // 支撑单元在本块内的边界三角形
        let btri = global
            .btri
            .iter()
            .filter_map(|tri| {
                let mut key = tri.nodes;
                key.sort_unstable();
                let owner = *face_owner.get(&key)?;
                (elem_rank(owner) == r).then(|| BoundaryTri {
                    nodes: [
                        lid[&tri.nodes[0]],
                        lid[&tri.nodes[1]],
                        lid[&tri.nodes[2]],
                    ],
                    sideset: tri.sideset,
                })
            })
            .collect();

        let mesh = TetMesh::new(coord, inpoel, btri)?;

        // 节点通信映射与所有权
        let mut node_comm: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut owned = vec![true; gid.len()];
        for (l, &g) in gid.iter().enumerate() {
            let parts = &node_parts[g];
            if parts.len() > 1 {
                for &other in parts {
                    if other != r {
                        node_comm.entry(other).or_default().push(g);
                    }
                }
                // 共享节点判给编号最小的分区
                owned[l] = parts.iter().next() == Some(&r);
            }
        }
        for shared in node_comm.values_mut() {
            shared.sort_unstable();
        }

        chunks.push(MeshChunk {
            rank: r,
            nparts,
            mesh,
            gid,
            lid,
            node_comm,
            owned,
        });
    }

    Ok(chunks)
}

/// 幽灵单元外侧面挂靠的保留边集编号（零阶外推处理，残差随幽灵行丢弃）
pub const GHOST_SIDESET: usize = usize::MAX;

/// 单元格式的分区块
///
/// 本块所有的单元排在前面，点邻接的幽灵单元排在后面。
/// 幽灵层覆盖本块单元的完整点周邻域，因此跨分区面的黎曼通量
/// 与限制器（含顶点型）的模板在本块单元上与整体网格一致。
/// 幽灵单元的解不在本块推进，每个阶段由所属分区发来覆写。
#[derive(Debug, Clone)]
pub struct CellChunk {
    /// 分区编号
    pub rank: usize,
    /// 分区总数
    pub nparts: usize,
    /// 局部网格（含幽灵单元；幽灵外侧面登记为 [`GHOST_SIDESET`]）
    pub mesh: TetMesh,
    /// 本块所有的单元数（幽灵单元编号从此起）
    pub nelem_owned: usize,
    /// 局部单元 → 全局单元编号
    pub egid: Vec<usize>,
    /// 对端分区 → 每阶段需发送的本块局部单元（升序）
    pub send: BTreeMap<usize, Vec<usize>>,
    /// 全局单元编号 → 局部幽灵单元编号
    pub ghost_lid: HashMap<usize, usize>,
}

impl CellChunk {
    /// 把整体网格包装成单分区块（串行场景，无幽灵层）
    pub fn serial(mesh: TetMesh) -> Self {
        let nelem = mesh.nelem();
        Self {
            rank: 0,
            nparts: 1,
            mesh,
            nelem_owned: nelem,
            egid: (0..nelem).collect(),
            send: BTreeMap::new(),
            ghost_lid: HashMap::new(),
        }
    }
}

/// 按单元连续区间切分并附加点邻接幽灵层
pub fn partition_cells(global: &TetMesh, nparts: usize) -> TfResult<Vec<CellChunk>> {
    if nparts == 0 {
        return Err(TfError::config("分区数必须大于零"));
    }
    if nparts > global.nelem() {
        return Err(TfError::config(format!(
            "分区数 {} 超过单元数 {}",
            nparts,
            global.nelem()
        )));
    }

    let nelem = global.nelem();
    let base = nelem / nparts;
    let rem = nelem % nparts;
    let mut ranges = Vec::with_capacity(nparts);
    let mut start = 0;
    for r in 0..nparts {
        let len = base + usize::from(r < rem);
        ranges.push(start..start + len);
        start += len;
    }
    let elem_rank = |e: usize| -> usize {
        ranges
            .iter()
            .position(|r| r.contains(&e))
            .unwrap_or(nparts - 1)
    };

    // 全局点周单元
    let mut esup: Vec<Vec<usize>> = vec![Vec::new(); global.nnode()];
    for (e, nodes) in global.inpoel.iter().enumerate() {
        for &n in nodes {
            esup[n].push(e);
        }
    }

    // 全局面 → 拥有单元列表，以及边界三角形的边集查询表
    const FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    let mut face_owners: HashMap<[usize; 3], Vec<usize>> = HashMap::new();
    for (e, nodes) in global.inpoel.iter().enumerate() {
        for f in &FACES {
            let mut key = [nodes[f[0]], nodes[f[1]], nodes[f[2]]];
            key.sort_unstable();
            face_owners.entry(key).or_default().push(e);
        }
    }
    let mut sideset_of: HashMap<[usize; 3], usize> = HashMap::new();
    for tri in &global.btri {
        let mut key = tri.nodes;
        key.sort_unstable();
        sideset_of.insert(key, tri.sideset);
    }

    let mut chunks = Vec::with_capacity(nparts);
    for (r, range) in ranges.iter().enumerate() {
        // 幽灵集合与发送表：与本块单元共点的外部单元互为幽灵
        let mut ghosts: BTreeSet<usize> = BTreeSet::new();
        let mut send_sets: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for e in range.clone() {
            for &n in &global.inpoel[e] {
                for &nb in &esup[n] {
                    if !range.contains(&nb) {
                        ghosts.insert(nb);
                        send_sets.entry(elem_rank(nb)).or_default().insert(e);
                    }
                }
            }
        }

        // 局部单元顺序: 本块区间在前, 幽灵按全局编号升序在后
        let egid: Vec<usize> = range.clone().chain(ghosts.iter().copied()).collect();
        let nelem_owned = range.len();
        let ghost_lid: HashMap<usize, usize> = ghosts
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, nelem_owned + i))
            .collect();
        let local_elems: BTreeSet<usize> = egid.iter().copied().collect();

        // 局部节点重编号
        let mut gid: Vec<usize> = egid
            .iter()
            .flat_map(|&e| global.inpoel[e].iter().copied())
            .collect();
        gid.sort_unstable();
        gid.dedup();
        let lid: HashMap<usize, usize> = gid.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        let coord: Vec<_> = gid.iter().map(|&g| global.coord[g]).collect();
        let inpoel: Vec<[usize; 4]> = egid
            .iter()
            .map(|&e| {
                let n = global.inpoel[e];
                [lid[&n[0]], lid[&n[1]], lid[&n[2]], lid[&n[3]]]
            })
            .collect();

        // 边界三角形: 真实域边界沿用边集, 幽灵外侧面挂保留边集
        let mut btri = Vec::new();
        for &ge in &egid {
            let n = global.inpoel[ge];
            for f in &FACES {
                let tri = [n[f[0]], n[f[1]], n[f[2]]];
                let mut key = tri;
                key.sort_unstable();
                if let Some(&sideset) = sideset_of.get(&key) {
                    btri.push(BoundaryTri {
                        nodes: [lid[&tri[0]], lid[&tri[1]], lid[&tri[2]]],
                        sideset,
                    });
                    continue;
                }
                let owners = &face_owners[&key];
                if owners.len() == 1 {
                    return Err(TfError::invalid_mesh(format!(
                        "单元 {ge} 的边界面 {key:?} 未登记边集编号"
                    )));
                }
                let exterior = owners.iter().any(|o| !local_elems.contains(o));
                if exterior {
                    btri.push(BoundaryTri {
                        nodes: [lid[&tri[0]], lid[&tri[1]], lid[&tri[2]]],
                        sideset: GHOST_SIDESET,
                    });
                }
            }
        }

        let mesh = TetMesh::new(coord, inpoel, btri)?;
        let send = send_sets
            .into_iter()
            .map(|(peer, elems)| {
                // 本块单元的局部编号 = 全局编号减区间起点
                (
                    peer,
                    elems.into_iter().map(|e| e - range.start).collect::<Vec<_>>(),
                )
            })
            .collect();

        chunks.push(CellChunk {
            rank: r,
            nparts,
            mesh,
            nelem_owned,
            egid,
            send,
            ghost_lid,
        });
    }

    Ok(chunks)
}
