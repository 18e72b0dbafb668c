// crates/tf_physics/tests/advection_accuracy.rs

//! 输运方程的精度检验
//!
//! 高斯峰以常速平移有解析解：数值解对终时刻解析解的 L2 误差
//! 必须小于"冻结初值"的误差（即不推进时的误差），否则格式
//! 没有在输运任何东西。FCT 路径同时检查解保持在初值包络内。

use glam::DVec3;
use tf_mesh::partition::MeshChunk;
use tf_mesh::TetMesh;
use tf_physics::boundary::{BcKind, BcTable};
use tf_physics::pde::{PdeSystem, Transport};
use tf_physics::problems::{GaussianHump, TransportProblem};
use tf_physics::types::FlowConfig;
use tf_physics::NodeStepper;
use tf_runtime::Channels;

const DT: f64 = 2.0e-3;
const NSTEPS: u64 = 50;

fn hump() -> GaussianHump {
    GaussianHump {
        center: DVec3::new(0.3, 0.25, 0.25),
        width: 0.15,
        velocity: DVec3::new(1.0, 0.0, 0.0),
    }
}

/// 推进后返回 (数值解误差, 冻结初值误差) 的 L2 范数
fn run(fct: bool) -> (f64, f64, Vec<f64>) {
    let mesh = TetMesh::box_mesh(10, 5, 5, 1.0, 0.5, 0.5).unwrap();
    let coord = mesh.coord.clone();
    let chunk = MeshChunk::serial(mesh);
    let mut comm = Channels::create(1).remove(0);

    let pde = PdeSystem::Transport(Transport::new(Box::new(hump())));
    let cfg = FlowConfig {
        fct,
        dt_fixed: Some(DT),
        ..Default::default()
    };
    let mut bc = BcTable::new();
    for s in 0..6 {
        bc.set(s, BcKind::Dirichlet).unwrap();
    }
    let mut stepper = NodeStepper::new(chunk, pde, cfg, bc).unwrap();
    stepper.initialize(&mut comm).unwrap();
    stepper.run(&mut comm, NSTEPS).unwrap();

    let t_end = NSTEPS as f64 * DT;
    let exact = hump();
    let mut err_num = 0.0;
    let mut err_frozen = 0.0;
    let mut numerical = Vec::with_capacity(coord.len());
    for (p, &x) in coord.iter().enumerate() {
        let u = stepper.solution().get(p, 0);
        let ue = exact.solution(x, t_end)[0];
        let u0 = exact.solution(x, 0.0)[0];
        err_num += (u - ue) * (u - ue);
        err_frozen += (u0 - ue) * (u0 - ue);
        numerical.push(u);
    }
    let n = coord.len() as f64;
    ((err_num / n).sqrt(), (err_frozen / n).sqrt(), numerical)
}

#[test]
fn test_fct_advection_beats_frozen_baseline() {
    let (err_num, err_frozen, _) = run(true);
    // 峰平移了 2/3 个峰宽, 冻结误差必须可观
    assert!(err_frozen > 0.01, "基准误差异常小: {err_frozen}");
    assert!(
        err_num < err_frozen,
        "数值误差 {err_num} 未优于冻结初值 {err_frozen}"
    );
}

#[test]
fn test_unlimited_advection_beats_frozen_baseline() {
    let (err_num, err_frozen, _) = run(false);
    assert!(
        err_num < err_frozen,
        "数值误差 {err_num} 未优于冻结初值 {err_frozen}"
    );
}

#[test]
fn test_fct_advection_stays_in_envelope() {
    let (_, _, numerical) = run(true);
    for (p, &v) in numerical.iter().enumerate() {
        assert!(v.is_finite(), "节点 {p} 非有限值");
        assert!(v > -1e-8 && v < 1.0 + 1e-8, "节点 {p} 越界: {v}");
    }
}
