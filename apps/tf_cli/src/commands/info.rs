// apps/tf_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示系统信息与默认求解配置。

use anyhow::Result;
use clap::Args;
use tf_physics::types::FlowConfig;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示系统信息
    #[arg(long)]
    pub system: bool,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== TetraFlow 信息 ===");

    if args.system {
        print_system_info();
    }

    if args.defaults {
        print_default_config();
    }

    if !args.system && !args.defaults {
        // 默认显示所有信息
        print_system_info();
        println!();
        print_default_config();
    }

    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("TetraFlow CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);

    println!("\n可用点格式: TwoStage, EdgeMuscl");
    println!("可用单元格式: P0 (欧拉), P1 (SSP-RK2)");
    println!("可用通量: Rusanov, AUSM");
    println!("可用限制器: SuperbeeP1, VertexBasedP1, WenoP1");
}

fn print_default_config() {
    println!("=== 默认配置 ===");

    let config = FlowConfig::default();

    println!("CFL 数: {}", config.cfl);
    println!("点格式: {:?}", config.scheme);
    println!("数值通量: {:?}", config.flux);
    println!("限制器: {:?}", config.limiter);
    println!("FCT: {}, ctau = {}", config.fct, config.ctau);
    println!("单元格式自由度: {}", config.ndof);

    println!("\n容差常量:");
    println!("  痕量材料阈值: {}", tf_foundation::tolerance::TRACE_ALPHA_EPS);
    println!("  体积分数下限: {}", tf_foundation::tolerance::ALPHA_FLOOR);
    println!("  压力下限: {}", tf_foundation::tolerance::PRESSURE_FLOOR);
    println!("  浮点比较容差: {}", tf_foundation::tolerance::FLOAT_EPS);
}
