// apps/tf_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 验证 JSON 格式的求解配置文件：先做反序列化（字段与类型
//! 检查），再走 [`FlowConfig::validate`] 的语义检查，最后附加
//! 几条经验性警告。

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tf_physics::types::{FlowConfig, PrelaxMode};
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== TetraFlow 配置验证 ===");
    println!("检查配置文件: {}", args.config.display());

    let mut result = ValidationResult::default();

    if !args.config.exists() {
        bail!("配置文件不存在: {}", args.config.display());
    }
    let content = std::fs::read_to_string(&args.config).context("无法读取配置文件")?;

    match serde_json::from_str::<FlowConfig>(&content) {
        Ok(cfg) => {
            println!("  ✓ 配置文件格式有效");
            if let Err(e) = cfg.validate() {
                result.add_error(e.to_string());
            }
            add_heuristic_warnings(&cfg, &mut result);
        }
        Err(e) => result.add_error(format!("JSON 解析错误: {e}")),
    }

    print_validation_result(&result, args.strict)
}

fn add_heuristic_warnings(cfg: &FlowConfig, result: &mut ValidationResult) {
    if cfg.cfl > 0.9 {
        result.add_warning(format!("CFL 数 {} 接近稳定上限, 可能不稳定", cfg.cfl));
    }
    if cfg.ndof == 4 && cfg.nmat() < 2 {
        result.add_warning("P1 单元格式通常用于多材料算例, 但只配置了一种材料");
    }
    if !cfg.fct && cfg.nmat() == 1 {
        result.add_warning("关闭 FCT 的点格式在间断附近可能振荡");
    }
    if let PrelaxMode::FiniteRate { ct } = cfg.prelax {
        if ct > 10.0 {
            result.add_warning(format!("压力松弛时标系数 {ct} 偏大, 松弛会很慢"));
        }
    }
    if let Some(dt) = cfg.dt_fixed {
        if dt <= 0.0 {
            result.add_error("固定时间步长必须为正");
        }
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
