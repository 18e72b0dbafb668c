// apps/tf_cli/src/commands/run.rs

//! 运行内置算例命令
//!
//! 在规则长方体网格上构造算例并推进指定步数：
//! - `advection`: 高斯峰标量输运（点格式, 可选 FCT）
//! - `sod`: Sod 激波管（点格式, 两阶段或边格式 MUSCL）
//! - `multimat`: 双材料激波管（单元格式, P0/P1）
//!
//! 所有算例支持 `--nparts` 多分区运行, 各分区在独立线程内推进:
//! 点格式交换分区边界的节点部分和, 单元格式同步幽灵单元解。

use std::thread;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use glam::DVec3;
use tf_mesh::partition::{partition_cells, partition_contiguous};
use tf_mesh::TetMesh;
use tf_physics::boundary::{BcKind, BcTable};
use tf_physics::eos::Material;
use tf_physics::pde::{CompFlow, MultiMat, PdeSystem, Transport};
use tf_physics::problems::{GaussianHump, MultiMatSod, SodShocktube};
use tf_physics::engine::{CellStepReport, StepReport};
use tf_physics::types::{FlowConfig, FluxKind, PrelaxMode, SchemeKind};
use tf_physics::{CellStepper, NodeStepper};
use tf_runtime::Channels;
use tracing::info;

/// 运行算例参数
#[derive(Args)]
pub struct RunArgs {
    /// 算例名称 (advection, sod, multimat)
    #[arg(short, long, default_value = "sod")]
    pub case: String,

    /// x 方向单元数（横向固定为 2）
    #[arg(long, default_value = "24")]
    pub cells: usize,

    /// 分区数（点格式算例）
    #[arg(short, long, default_value = "1")]
    pub nparts: usize,

    /// 推进步数
    #[arg(short, long, default_value = "40")]
    pub steps: u64,

    /// 固定时间步长（缺省按 CFL 自适应）
    #[arg(long)]
    pub dt: Option<f64>,

    /// CFL 数
    #[arg(long, default_value = "0.5")]
    pub cfl: f64,

    /// 关闭 FCT 限制（点格式）
    #[arg(long)]
    pub no_fct: bool,

    /// 使用边格式 MUSCL 装配（仅 sod）
    #[arg(long)]
    pub edge: bool,

    /// 单元格式每分量自由度数 (1=P0, 4=P1)
    #[arg(long, default_value = "1")]
    pub ndof: usize,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== TetraFlow 算例启动 ===");
    info!(
        "算例: {}, 网格: {}x2x2, 分区: {}, 步数: {}",
        args.case, args.cells, args.nparts, args.steps
    );

    let start = Instant::now();
    match args.case.as_str() {
        "advection" => run_advection(&args)?,
        "sod" => run_sod(&args)?,
        "multimat" => run_multimat(&args)?,
        other => bail!("未知算例: {other} (可选: advection, sod, multimat)"),
    }
    info!("计算时间: {:.3} s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_advection(args: &RunArgs) -> Result<()> {
    let nx = args.cells;
    let cfg = FlowConfig {
        cfl: args.cfl,
        fct: !args.no_fct,
        dt_fixed: args.dt,
        ..Default::default()
    };
    cfg.validate().context("配置校验失败")?;

    let make_pde = || {
        PdeSystem::Transport(Transport::new(Box::new(GaussianHump {
            center: DVec3::new(0.3, 0.1, 0.1),
            width: 0.1,
            velocity: DVec3::new(1.0, 0.0, 0.0),
        })))
    };
    let mut bc = BcTable::new();
    for s in 0..6 {
        bc.set(s, BcKind::Dirichlet)?;
    }
    let mesh = TetMesh::box_mesh(nx, 2, 2, 1.0, 0.2, 0.2).context("网格构造失败")?;
    run_node_case(mesh, args, cfg, make_pde, bc)
}

fn run_sod(args: &RunArgs) -> Result<()> {
    let nx = args.cells;
    let ly = 2.0 / nx as f64;
    let cfg = FlowConfig {
        cfl: args.cfl,
        scheme: if args.edge {
            SchemeKind::EdgeMuscl
        } else {
            SchemeKind::TwoStage
        },
        fct: !args.no_fct,
        dt_fixed: args.dt,
        ..Default::default()
    };
    cfg.validate().context("配置校验失败")?;

    let make_pde = || {
        PdeSystem::CompFlow(CompFlow::new(
            Material::ideal_gas(1.4),
            Box::new(SodShocktube),
            None,
        ))
    };
    let mut bc = BcTable::new();
    bc.set(0, BcKind::Dirichlet)?;
    bc.set(1, BcKind::Dirichlet)?;
    for s in 2..6 {
        bc.set(s, BcKind::Symmetry)?;
    }
    let mesh = TetMesh::box_mesh(nx, 2, 2, 1.0, ly, ly).context("网格构造失败")?;
    run_node_case(mesh, args, cfg, make_pde, bc)
}

fn run_multimat(args: &RunArgs) -> Result<()> {
    let nx = args.cells;
    let materials = vec![Material::ideal_gas(1.4), Material::ideal_gas(1.4)];
    let cfg = FlowConfig {
        cfl: args.cfl.min(0.3),
        materials: materials.clone(),
        flux: FluxKind::Rusanov,
        prelax: PrelaxMode::Instantaneous,
        ndof: args.ndof,
        dt_fixed: args.dt,
        ..Default::default()
    };
    cfg.validate().context("配置校验失败")?;

    let mesh =
        TetMesh::box_mesh(nx, 1, 1, 1.0, 1.0 / nx as f64, 1.0 / nx as f64).context("网格构造失败")?;
    let mut bc = BcTable::new();
    bc.set(0, BcKind::Dirichlet)?;
    bc.set(1, BcKind::Dirichlet)?;
    for s in 2..6 {
        bc.set(s, BcKind::Symmetry)?;
    }
    info!("网格: {} 节点, {} 单元", mesh.nnode(), mesh.nelem());

    let chunks = partition_cells(&mesh, args.nparts).context("网格分区失败")?;
    let comms = Channels::create(args.nparts);
    let steps = args.steps;
    let ndof = args.ndof;

    let mut handles = Vec::new();
    for (chunk, mut comm) in chunks.into_iter().zip(comms) {
        let cfg = cfg.clone();
        let bc = bc.clone();
        let materials = materials.clone();
        handles.push(thread::spawn(
            move || -> tf_foundation::TfResult<(usize, CellStepReport)> {
                let rank = chunk.rank;
                let mm = MultiMat::new(
                    materials,
                    Box::new(MultiMatSod),
                    FluxKind::Rusanov,
                    PrelaxMode::Instantaneous,
                    ndof,
                );
                let mut stepper = CellStepper::new_partitioned(chunk, mm, cfg, bc)?;
                stepper.initialize()?;
                let report = stepper.run(&mut comm, steps)?;
                Ok((rank, report))
            },
        ));
    }

    for h in handles {
        let (rank, report) = match h.join() {
            Ok(r) => r.context("分区推进失败")?,
            Err(_) => bail!("分区线程崩溃"),
        };
        if rank == 0 {
            info!(
                "=== 完成: {} 步, t={:.5}, 最后 dt={:.2e} ===",
                report.step, report.t, report.dt
            );
        }
    }
    Ok(())
}

/// 点格式算例的分区并行执行骨架
fn run_node_case<F>(
    mesh: TetMesh,
    args: &RunArgs,
    cfg: FlowConfig,
    make_pde: F,
    bc: BcTable,
) -> Result<()>
where
    F: Fn() -> PdeSystem + Send + Sync + Clone + 'static,
{
    info!("网格: {} 节点, {} 单元", mesh.nnode(), mesh.nelem());
    let chunks = partition_contiguous(&mesh, args.nparts).context("网格分区失败")?;
    let comms = Channels::create(args.nparts);
    let steps = args.steps;

    let mut handles = Vec::new();
    for (chunk, mut comm) in chunks.into_iter().zip(comms) {
        let make_pde = make_pde.clone();
        let cfg = cfg.clone();
        let bc = bc.clone();
        handles.push(thread::spawn(
            move || -> tf_foundation::TfResult<(usize, StepReport)> {
                let rank = chunk.rank;
                let mut stepper = NodeStepper::new(chunk, make_pde(), cfg, bc)?;
                stepper.initialize(&mut comm)?;
                let report = stepper.run(&mut comm, steps)?;
                Ok((rank, report))
            },
        ));
    }

    for h in handles {
        let (rank, report) = match h.join() {
            Ok(r) => r.context("分区推进失败")?,
            Err(_) => bail!("分区线程崩溃"),
        };
        if rank == 0 {
            info!(
                "=== 完成: {} 步, t={:.5}, 最后 dt={:.2e}, |Δu|={:.3e} ===",
                report.step, report.t, report.dt, report.du_norm
            );
        }
    }
    Ok(())
}
