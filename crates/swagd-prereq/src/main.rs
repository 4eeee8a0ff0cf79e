//! 前置依赖检查程序（安装程序钩子）。
//!
//! 职责：
//! - 读取 `prereq-manifest.json`，检查 GDAL 等第三方依赖是否已安装
//! - 缺失时提示用户并打开下载地址；本次运行以“阻塞”结束，安装完成后重新运行
//! - 依赖全部满足时配置机器级环境变量（`GDAL_DATA`、`PATH`）
//!
//! 退出码：
//! - `0`：全部满足 / 操作成功
//! - `1`：存在未满足的依赖（阻塞）
//! - `2`：失败（清单无效、环境变量写入失败等）
//!
//! 权限要求：
//! - 写入机器级环境变量需要以管理员权限运行
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

mod console;
mod snapshot;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{error, info, warn};

use swagd_core::env::EnvStore;
use swagd_core::flow::{self, FixedAnswer, FlowContext, FlowOutcome, Launcher, PromptAnswer, Prompter};
use swagd_core::inventory::{read_inventory, InventoryScope, InventorySource, VersionField};
use swagd_core::manifest::PrereqManifest;
use swagd_core::paths::{self, process_env_lookup, MANIFEST_FILE};
use swagd_core::resolve::ResolutionPolicy;
use swagd_windows::launcher::{LogOnlyLauncher, ShellLauncher};
use swagd_windows::platform;

use crate::console::ConsolePrompter;
use crate::snapshot::{load_inventory_snapshot, FileEnvStore};

/// 命令行参数。
///
/// 说明：
/// - `manifest` 指向前置依赖清单（默认 `prereq-manifest.json`）
/// - `silent` 用于无人值守安装：未指定 `--answer` 时按“否”处理
/// - 快照参数用于演练与测试，替代注册表读写
#[derive(Debug, Parser)]
#[command(name = "swagd-prereq", version)]
struct Cli {
    #[arg(long, global = true, default_value = MANIFEST_FILE)]
    manifest: PathBuf,

    #[arg(long, global = true, default_value_t = false)]
    silent: bool,

    /// 非交互回答安装提示。
    #[arg(long, global = true, value_enum)]
    answer: Option<Answer>,

    /// 从 JSON 文件读取已安装软件（代替注册表）。
    #[arg(long, global = true)]
    inventory_snapshot: Option<PathBuf>,

    /// 读写 JSON 文件中的环境变量（代替机器级注册表）。
    #[arg(long, global = true)]
    env_snapshot: Option<PathBuf>,

    /// 只记录下载地址，不实际打开。
    #[arg(long, global = true, default_value_t = false)]
    no_launch: bool,

    /// 在终端中提示，而不是弹出消息框。
    #[arg(long, global = true, default_value_t = false)]
    console: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Answer {
    Yes,
    No,
}

/// 支持的子命令。
#[derive(Debug, Subcommand)]
enum Commands {
    /// 完整流程：检查依赖，缺失则提示安装，全部满足则配置环境变量。
    Run,
    /// 检查全部依赖并输出结果（不做系统修改）。
    Check {
        /// 以 JSON 输出。
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// 只配置环境变量（不检查依赖）。
    Configure,
    /// 列出某个范围内的已安装软件。
    Inventory {
        #[arg(long, default_value = "machine64")]
        scope: InventoryScope,
    },
    /// 环境自检（管理员权限、Program Files、各范围软件数量）。
    Doctor,
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("初始化日志失败: {e:#}");
    }

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Run => run(&cli),
        Commands::Check { json } => check(&cli, *json),
        Commands::Configure => configure(&cli),
        Commands::Inventory { scope } => inventory(&cli, *scope),
        Commands::Doctor => doctor(&cli),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// 读取并校验前置依赖清单（JSON）。
///
/// 异常处理：
/// - 文件读取失败、JSON 解析失败或校验不通过时返回错误
fn load_manifest(path: &Path) -> Result<PrereqManifest> {
    let bytes = std::fs::read(path).with_context(|| format!("读取清单失败: {}", path.display()))?;
    let manifest: PrereqManifest = serde_json::from_slice(&bytes).context("解析清单 JSON 失败")?;
    manifest.validate().context("清单校验失败")?;
    Ok(manifest)
}

fn inventory_source(cli: &Cli) -> Result<Box<dyn InventorySource>> {
    match &cli.inventory_snapshot {
        Some(path) => Ok(Box::new(load_inventory_snapshot(path)?)),
        None => Ok(platform::default_inventory_source()),
    }
}

fn env_store(cli: &Cli) -> Result<Box<dyn EnvStore>> {
    match &cli.env_snapshot {
        Some(path) => Ok(Box::new(FileEnvStore::open(path)?)),
        None => Ok(platform::default_env_store()),
    }
}

/// 选择提示器。
///
/// 优先级：`--answer` > `--silent`（按“否”）> `--console` > 平台默认
fn prompter(cli: &Cli) -> Box<dyn Prompter> {
    match (cli.answer, cli.silent) {
        (Some(Answer::Yes), _) => Box::new(FixedAnswer(PromptAnswer::Accepted)),
        (Some(Answer::No), _) => Box::new(FixedAnswer(PromptAnswer::Declined)),
        (None, true) => Box::new(FixedAnswer(PromptAnswer::Declined)),
        (None, false) if cli.console => Box::new(ConsolePrompter),
        (None, false) => default_prompter(),
    }
}

#[cfg(windows)]
fn default_prompter() -> Box<dyn Prompter> {
    Box::new(swagd_windows::dialog::MessageBoxPrompter)
}

#[cfg(not(windows))]
fn default_prompter() -> Box<dyn Prompter> {
    Box::new(ConsolePrompter)
}

fn launcher(cli: &Cli) -> Box<dyn Launcher> {
    if cli.no_launch {
        Box::new(LogOnlyLauncher::default())
    } else {
        Box::new(ShellLauncher)
    }
}

/// 执行完整流程。
///
/// 返回值：
/// - 全部满足且环境变量已配置：退出码 0
/// - 被未满足的依赖阻塞：退出码 1
///
/// 异常处理：
/// - 环境变量写入失败（常见原因：非管理员）等返回错误，由 `main` 映射为退出码 2
fn run(cli: &Cli) -> Result<ExitCode> {
    let manifest = load_manifest(&cli.manifest)?;
    let source = inventory_source(cli)?;
    let mut store = env_store(cli)?;
    let mut prompter = prompter(cli);
    let mut launcher = launcher(cli);

    let outcome = flow::run(
        &manifest,
        FlowContext {
            source: source.as_ref(),
            prompter: prompter.as_mut(),
            launcher: launcher.as_mut(),
            store: store.as_mut(),
            lookup: process_env_lookup,
        },
    )?;

    match outcome {
        FlowOutcome::Success { environment } => {
            for report in &environment {
                println!("{} = {:?} ({})", report.variable, report.outcome, report.value);
            }
            if !cli.silent {
                info!("前置依赖已全部满足，可以继续安装");
            }
            Ok(ExitCode::SUCCESS)
        }
        FlowOutcome::Blocked(reason) => {
            println!("blocked = {}", serde_json::to_string(&reason)?);
            Ok(ExitCode::from(1))
        }
    }
}

/// 检查全部依赖并输出（不提示、不写入）。
///
/// 输出格式：
/// - 文本：每个依赖一行 `显示名 (id) = satisfied | missing | not evaluated`
/// - JSON：`{ "satisfied": bool, "result": {...} }`
fn check(cli: &Cli, as_json: bool) -> Result<ExitCode> {
    let manifest = load_manifest(&cli.manifest)?;
    let source = inventory_source(cli)?;
    let result = flow::resolve_requirements(&manifest, source.as_ref(), ResolutionPolicy::Exhaustive)?;

    if as_json {
        let doc = json!({
            "product_name": manifest.product_name,
            "satisfied": result.is_satisfied(),
            "result": result,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        for req in &manifest.requirements {
            let status = if result.satisfied().iter().any(|s| s.requirement_id == req.id) {
                "satisfied"
            } else if result.unsatisfied().iter().any(|u| u.requirement_id == req.id) {
                "missing"
            } else {
                "not evaluated"
            };
            println!("{} ({}) = {}", req.label(), req.id, status);
        }
    }

    Ok(if result.is_satisfied() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// 只配置环境变量（用于依赖已由其他方式确认的场景）。
fn configure(cli: &Cli) -> Result<ExitCode> {
    let manifest = load_manifest(&cli.manifest)?;
    let mut store = env_store(cli)?;
    let reports = flow::configure_environment(&manifest.environment, process_env_lookup, store.as_mut())?;
    for report in &reports {
        println!("{} = {:?} ({})", report.variable, report.outcome, report.value);
    }
    Ok(ExitCode::SUCCESS)
}

/// 清单中配置的版本字段；清单不可用时退回默认字段。
fn manifest_version_field(cli: &Cli) -> VersionField {
    match load_manifest(&cli.manifest) {
        Ok(m) => m.inventory.version_field,
        Err(e) => {
            warn!("未能读取清单，使用默认版本字段: {e:#}");
            VersionField::default()
        }
    }
}

/// 列出指定范围内的已安装软件（`名称 = 版本`）。
fn inventory(cli: &Cli, scope: InventoryScope) -> Result<ExitCode> {
    let field = manifest_version_field(cli);
    let source = inventory_source(cli)?;
    for record in read_inventory(source.as_ref(), scope, field) {
        println!("{} = {}", record.name, record.version);
    }
    Ok(ExitCode::SUCCESS)
}

/// 环境自检（用于排障）。
///
/// 输出：
/// - 是否管理员运行
/// - Program Files 目录
/// - 各范围可读取到的软件数量
fn doctor(cli: &Cli) -> Result<ExitCode> {
    println!("admin = {}", platform::is_admin()?);
    match paths::program_files_dir() {
        Ok(dir) => println!("program_files = {}", dir.display()),
        Err(e) => println!("program_files = <unavailable: {e:#}>"),
    }
    let field = manifest_version_field(cli);
    let source = inventory_source(cli)?;
    for scope in InventoryScope::ALL {
        let count = read_inventory(source.as_ref(), scope, field).len();
        println!("{scope} = {count}");
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn cli_for(manifest: &Path) -> Cli {
        Cli::parse_from([
            OsStr::new("swagd-prereq"),
            OsStr::new("--manifest"),
            manifest.as_os_str(),
            OsStr::new("doctor"),
        ])
    }

    #[test]
    fn version_field_follows_manifest() {
        let dir = std::env::temp_dir().join(format!("swagd-prereq-field-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prereq-manifest.json");
        std::fs::write(
            &path,
            r#"{ "product_name": "x", "inventory": { "version_field": "display" } }"#,
        )
        .unwrap();

        let field = manifest_version_field(&cli_for(&path));
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(field, VersionField::Display);
    }

    #[test]
    fn version_field_defaults_without_manifest() {
        let missing = std::env::temp_dir().join(format!("swagd-missing-{}.json", uuid::Uuid::new_v4()));
        assert_eq!(manifest_version_field(&cli_for(&missing)), VersionField::Packed);
    }
}
