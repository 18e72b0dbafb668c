// crates/tf_physics/tests/multimat_parallel.rs

//! 单元格式分区并行与串行推进的一致性
//!
//! 同一网格按 1/2/3 分区推进同样的步数，逐全局单元比较解。
//! 幽灵层同步只改变浮点求和顺序，不得改变格式语义。

use std::thread;

use glam::DVec3;
use tf_mesh::partition::partition_cells;
use tf_mesh::TetMesh;
use tf_physics::boundary::{BcKind, BcTable};
use tf_physics::eos::Material;
use tf_physics::pde::MultiMat;
use tf_physics::problems::InterfaceAdvection;
use tf_physics::types::{FlowConfig, FluxKind, PrelaxMode};
use tf_physics::CellStepper;
use tf_runtime::Channels;

fn global_mesh() -> TetMesh {
    TetMesh::box_mesh(6, 1, 1, 1.0, 0.2, 0.2).unwrap()
}

fn make_system(ndof: usize) -> MultiMat {
    MultiMat::new(
        vec![Material::ideal_gas(1.4), Material::ideal_gas(1.4)],
        Box::new(InterfaceAdvection {
            interface: 0.5,
            velocity: DVec3::new(1.0, 0.0, 0.0),
            pressure: 1.0,
            rho: [1.0, 2.0],
        }),
        FluxKind::Ausm,
        PrelaxMode::Off,
        ndof,
    )
}

/// `nparts` 分区推进 `nsteps` 步，返回按全局单元编号排列的解行
fn run_partitions(nparts: usize, nsteps: u64, ndof: usize, dt: Option<f64>) -> Vec<Vec<f64>> {
    let global = global_mesh();
    let nelem_global = global.nelem();
    let chunks = partition_cells(&global, nparts).unwrap();
    let comms = Channels::create(nparts);

    let mut handles = Vec::new();
    for (chunk, mut comm) in chunks.into_iter().zip(comms) {
        handles.push(thread::spawn(move || {
            let mm = make_system(ndof);
            let cfg = FlowConfig {
                cfl: 0.3,
                materials: vec![Material::ideal_gas(1.4), Material::ideal_gas(1.4)],
                flux: FluxKind::Ausm,
                ndof,
                dt_fixed: dt,
                ..Default::default()
            };
            let mut bc = BcTable::new();
            for s in 0..6 {
                bc.set(s, BcKind::Extrapolate).unwrap();
            }
            let mut stepper = CellStepper::new_partitioned(chunk, mm, cfg, bc).unwrap();
            stepper.initialize().unwrap();
            stepper.run(&mut comm, nsteps).unwrap();
            let nowned = stepper.chunk().nelem_owned;
            let egid = stepper.chunk().egid[..nowned].to_vec();
            let rows: Vec<Vec<f64>> = (0..nowned)
                .map(|e| stepper.solution().row(e).to_vec())
                .collect();
            (egid, rows)
        }));
    }

    let mut out = vec![Vec::new(); nelem_global];
    for h in handles {
        let (egid, rows) = h.join().unwrap();
        for (l, &g) in egid.iter().enumerate() {
            out[g] = rows[l].clone();
        }
    }
    out
}

fn compare(serial: &[Vec<f64>], par: &[Vec<f64>], tol: f64) {
    for (e, (s, p)) in serial.iter().zip(par).enumerate() {
        assert_eq!(s.len(), p.len(), "全局单元 {e} 解行宽不一致");
        for (k, (a, b)) in s.iter().zip(p).enumerate() {
            assert!(
                (a - b).abs() < tol,
                "全局单元 {e} 分量 {k}: 串行 {a} 分区 {b}"
            );
        }
    }
}

#[test]
fn test_two_partition_p0_matches_serial() {
    let serial = run_partitions(1, 3, 1, Some(2.0e-3));
    let par = run_partitions(2, 3, 1, Some(2.0e-3));
    compare(&serial, &par, 1e-10);
}

#[test]
fn test_three_partition_p1_matches_serial() {
    // P1 多了体积分与限制器, 跨分区面两侧的通量各自计算,
    // 容差按浮点结合律误差的量级放宽
    let serial = run_partitions(1, 2, 4, Some(2.0e-3));
    let par = run_partitions(3, 2, 4, Some(2.0e-3));
    compare(&serial, &par, 1e-8);
}

#[test]
fn test_partitioned_cfl_run_stays_physical() {
    // 自适应步长路径: dt 经 Min 全归约, 各分区推进同一 dt
    let par = run_partitions(2, 4, 1, None);
    for (e, row) in par.iter().enumerate() {
        // [α0, α1] 是前两个分量 (体积分数排最前)
        let s = row[0] + row[1];
        assert!((s - 1.0).abs() < 1e-12, "全局单元 {e} 体积分数和 {s}");
        for v in row {
            assert!(v.is_finite(), "全局单元 {e} 非有限值");
        }
    }
}
