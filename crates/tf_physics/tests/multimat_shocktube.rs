// crates/tf_physics/tests/multimat_shocktube.rs

//! 双材料激波管（单元格式）
//!
//! 左右各一种材料的 Sod 变体, P0 与 P1 各推进若干步,
//! 检验痕量修正与瞬时压力松弛下状态保持物理可取。

use tf_mesh::TetMesh;
use tf_physics::boundary::{BcKind, BcTable};
use tf_physics::eos::Material;
use tf_physics::pde::MultiMat;
use tf_physics::problems::MultiMatSod;
use tf_physics::types::{FlowConfig, FluxKind, PrelaxMode};
use tf_physics::CellStepper;
use tf_runtime::Channels;

fn sod_cell_stepper(ndof: usize, prelax: PrelaxMode) -> CellStepper {
    let materials = vec![Material::ideal_gas(1.4), Material::ideal_gas(1.4)];
    let mesh = TetMesh::box_mesh(16, 1, 1, 1.0, 1.0 / 16.0, 1.0 / 16.0).unwrap();
    let mm = MultiMat::new(
        materials.clone(),
        Box::new(MultiMatSod),
        FluxKind::Rusanov,
        prelax,
        ndof,
    );
    let cfg = FlowConfig {
        materials,
        flux: FluxKind::Rusanov,
        prelax,
        cfl: 0.3,
        ndof,
        ..Default::default()
    };
    let mut bc = BcTable::new();
    bc.set(0, BcKind::Dirichlet).unwrap();
    bc.set(1, BcKind::Dirichlet).unwrap();
    for s in 2..6 {
        bc.set(s, BcKind::Symmetry).unwrap();
    }
    CellStepper::new(mesh, mm, cfg, bc).unwrap()
}

fn check_state(stepper: &CellStepper) {
    let layout = *stepper.system().layout();
    let ndof = stepper.system().ndof();
    for e in 0..stepper.mesh().nelem() {
        let row = stepper.solution().row(e);
        let mut alsum = 0.0;
        let mut rho = 0.0;
        for k in 0..2 {
            let al = row[layout.volfrac(k) * ndof];
            assert!(al > 0.0 && al < 1.0, "单元 {e} 材料 {k} 体积分数 {al}");
            alsum += al;
            rho += row[layout.density(k) * ndof];
            assert!(
                row[layout.energy(k) * ndof] > 0.0,
                "单元 {e} 材料 {k} 能量非正"
            );
        }
        assert!((alsum - 1.0).abs() < 1e-12, "单元 {e} 体积分数和 {alsum}");
        assert!(rho > 0.1 && rho < 1.1, "单元 {e} 总密度 {rho}");
    }
}

#[test]
fn test_p0_shocktube_state_stays_physical() {
    let mut stepper = sod_cell_stepper(1, PrelaxMode::Off);
    stepper.initialize().unwrap();
    let mut comms = Channels::create(1);
    let report = stepper.run(&mut comms[0], 10).unwrap();
    assert!(report.t > 0.0 && report.dt > 0.0);
    check_state(&stepper);
}

#[test]
fn test_p1_shocktube_with_instantaneous_relaxation() {
    let mut stepper = sod_cell_stepper(4, PrelaxMode::Instantaneous);
    stepper.initialize().unwrap();
    let mut comms = Channels::create(1);
    let report = stepper.run(&mut comms[0], 6).unwrap();
    assert!(report.t > 0.0);
    check_state(&stepper);
}

#[test]
fn test_shock_moves_interface_energy_rightward() {
    // 高压区能量向右输运: 右半平均能量上升
    let mut stepper = sod_cell_stepper(1, PrelaxMode::Off);
    stepper.initialize().unwrap();
    let layout = *stepper.system().layout();
    let right_energy = |s: &CellStepper| -> f64 {
        let mut sum = 0.0;
        let mut n = 0;
        for e in 0..s.mesh().nelem() {
            if s.mesh().element_centroid(e).x > 0.5 {
                let row = s.solution().row(e);
                sum += row[layout.energy(0)] + row[layout.energy(1)];
                n += 1;
            }
        }
        sum / n as f64
    };
    let before = right_energy(&stepper);
    let mut comms = Channels::create(1);
    stepper.run(&mut comms[0], 10).unwrap();
    let after = right_energy(&stepper);
    assert!(after > before, "右半平均能量 {before} → {after}");
}
