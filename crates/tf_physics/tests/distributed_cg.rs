// crates/tf_physics/tests/distributed_cg.rs

//! 分布式共轭梯度端到端检验
//!
//! 一致质量阵是对称正定的, 取已知光滑场 xs 构造右端项
//! b = M·xs, 串行与双分区求解都应收敛回 xs。
//! 分区侧的矩阵与右端项均为部分装配, 补全发生在求解器内部。

use std::thread;

use glam::DVec3;
use tf_mesh::partition::partition_contiguous;
use tf_mesh::{DerivedConnectivity, TetMesh};
use tf_physics::linear_algebra::{solve, solve_serial, CgConfig, CsrMatrix};
use tf_runtime::Channels;

/// 一致质量阵: 对角 J/60, 非对角 J/120
fn assemble_mass(mesh: &TetMesh, gid: &[usize]) -> CsrMatrix {
    let derived = DerivedConnectivity::build(mesh, gid).unwrap();
    let mut m = CsrMatrix::from_psup(&derived.psup);
    for e in 0..mesh.nelem() {
        let geo = mesh.element_geometry(e).unwrap();
        let nodes = mesh.inpoel[e];
        for a in 0..4 {
            for b in 0..4 {
                let v = if a == b {
                    geo.jacobian / 60.0
                } else {
                    geo.jacobian / 120.0
                };
                m.add(nodes[a], nodes[b], v).unwrap();
            }
        }
    }
    m
}

fn smooth_field(x: DVec3) -> f64 {
    1.0 + x.x + 2.0 * x.y + 3.0 * x.z + x.x * x.y
}

#[test]
fn test_serial_mass_solve_recovers_field() {
    let mesh = TetMesh::box_mesh(3, 3, 3, 1.0, 1.0, 1.0).unwrap();
    let gid: Vec<usize> = (0..mesh.nnode()).collect();
    let m = assemble_mass(&mesh, &gid);
    let xs: Vec<f64> = mesh.coord.iter().map(|&x| smooth_field(x)).collect();
    let mut b = vec![0.0; xs.len()];
    m.mult(&xs, &mut b).unwrap();

    let mut x = vec![0.0; xs.len()];
    let stats = solve_serial(&m, &b, &mut x, &CgConfig::default()).unwrap();
    assert!(stats.iterations > 0);
    for (p, (got, want)) in x.iter().zip(&xs).enumerate() {
        assert!((got - want).abs() < 1e-7, "节点 {p}: {got} ≠ {want}");
    }
}

#[test]
fn test_two_partition_solve_matches_field() {
    let global = TetMesh::box_mesh(3, 3, 3, 1.0, 1.0, 1.0).unwrap();
    let chunks = partition_contiguous(&global, 2).unwrap();
    let comms = Channels::create(2);

    let mut handles = Vec::new();
    for (chunk, mut comm) in chunks.into_iter().zip(comms) {
        handles.push(thread::spawn(move || {
            let m = assemble_mass(&chunk.mesh, &chunk.gid);
            let xs: Vec<f64> = chunk.mesh.coord.iter().map(|&x| smooth_field(x)).collect();
            // 部分装配的右端项: 本地矩阵乘本地精确解,
            // 共享节点上各分区的部分和相加即为全局 b
            let mut b = vec![0.0; xs.len()];
            m.mult(&xs, &mut b).unwrap();

            let mut x = vec![0.0; xs.len()];
            let stats = solve(&m, &b, &mut x, &chunk, &mut comm, 0, &CgConfig::default())
                .unwrap();
            assert!(stats.iterations > 0);
            for (p, (got, want)) in x.iter().zip(&xs).enumerate() {
                assert!(
                    (got - want).abs() < 1e-7,
                    "分区 {} 节点 {p}: {got} ≠ {want}",
                    chunk.rank
                );
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}
