//! 前置依赖处理流程（解析 → 提示 → 启动安装 / 配置环境变量）。
//!
//! 状态流转：
//! - `Start → 解析依赖 → 全部满足 → 配置环境变量 → Success`
//! - `Start → 解析依赖 → 存在未满足 → 提示用户 → 同意 → 启动安装 → Blocked(等待外部安装)`
//! - `Start → 解析依赖 → 存在未满足 → 提示用户 → 拒绝 → Blocked(用户拒绝)`
//!
//! “Blocked” 是本次运行的终态；调用方（安装程序或桌面窗口）应中止，待下次运行时重新检查。
//!
//! 说明：
//! - 解析是纯计算；用户提示、启动下载、写环境变量都通过注入的协作者完成
//! - 桌面窗口可以单独调用 [`resolve_requirements`] / [`remediate`] / [`configure_environment`]，
//!   用窗口内按钮代替阻塞式对话框
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::env::{apply_env_specs, EnvError, EnvReport, EnvStore};
use crate::inventory::{Inventory, InventorySource};
use crate::manifest::{EnvSpec, ManifestError, PrereqManifest};
use crate::paths::{expand_placeholders, PlaceholderError};
use crate::resolve::{resolve, ResolutionPolicy, ResolutionResult, ResolutionStatus, Unsatisfied};

/// 提示对话框标题。
pub const PROMPT_TITLE: &str = "Missing Application";

/// 用户对安装提示的回答。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAnswer {
    Accepted,
    Declined,
}

/// 用户提示（外部协作者）：展示消息与“是/否”两个按钮，阻塞直到用户选择。
pub trait Prompter {
    fn confirm(&mut self, title: &str, message: &str) -> anyhow::Result<PromptAnswer>;
}

/// 安装启动器（外部协作者）：按下载地址启动外部安装，发出即返回，不等待完成。
pub trait Launcher {
    fn launch(&mut self, download_url: &str) -> anyhow::Result<()>;
}

impl<T: Prompter + ?Sized> Prompter for Box<T> {
    fn confirm(&mut self, title: &str, message: &str) -> anyhow::Result<PromptAnswer> {
        (**self).confirm(title, message)
    }
}

impl<T: Launcher + ?Sized> Launcher for Box<T> {
    fn launch(&mut self, download_url: &str) -> anyhow::Result<()> {
        (**self).launch(download_url)
    }
}

/// 固定回答的提示器（静默/非交互运行）。
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub PromptAnswer);

impl Prompter for FixedAnswer {
    fn confirm(&mut self, title: &str, message: &str) -> anyhow::Result<PromptAnswer> {
        info!("[{title}] {message} -> {:?}（非交互）", self.0);
        Ok(self.0)
    }
}

/// 阻塞原因。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// 用户同意安装；`launched` 表示是否实际启动了下载。
    PendingExternalInstall { requirement_id: String, launched: bool },
    /// 用户拒绝安装。
    UserDeclined { requirement_id: String },
}

/// 流程结果（不含错误）。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlowOutcome {
    /// 全部依赖满足且环境变量已配置。
    Success { environment: Vec<EnvReport> },
    /// 被未满足的依赖阻塞。
    Blocked(BlockReason),
}

/// 流程错误。
///
/// 说明：
/// - 与“依赖未满足/用户拒绝”区分；这些是终止整次运行的失败
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("清单无效: {0}")]
    Manifest(#[from] ManifestError),
    #[error("环境变量值无效 ({variable}): {source}")]
    Placeholder {
        variable: String,
        #[source]
        source: PlaceholderError,
    },
    #[error("环境变量持久化失败: {0}")]
    Persist(#[from] EnvError),
    #[error("用户提示失败: {0:#}")]
    Prompt(anyhow::Error),
    #[error("启动安装失败 ({url}): {cause:#}")]
    Launch { url: String, cause: anyhow::Error },
}

/// 读取已安装软件清单并解析依赖（每次调用都重新读取，不做缓存）。
///
/// 参数：
/// - `manifest`：前置依赖清单
/// - `source`：已安装软件数据源
/// - `policy`：解析策略
///
/// 异常处理：
/// - 依赖匹配模式无效时返回 [`FlowError::Manifest`]
pub fn resolve_requirements(
    manifest: &PrereqManifest,
    source: &dyn InventorySource,
    policy: ResolutionPolicy,
) -> Result<ResolutionResult, FlowError> {
    let inventory = Inventory::read(
        source,
        manifest.scopes_to_read(),
        manifest.inventory.version_field,
    );
    Ok(resolve(
        &manifest.requirements,
        &manifest.inventory.scopes,
        &inventory,
        policy,
    )?)
}

/// 根据用户回答处理未满足的依赖。
///
/// 行为：
/// - 同意且有下载地址：启动安装，结果为“等待外部安装”
/// - 同意但下载地址为空：不启动，记录告警，结果仍为“等待外部安装”
/// - 拒绝：结果为“用户拒绝”
///
/// 异常处理：
/// - 启动失败返回 [`FlowError::Launch`]
pub fn remediate(
    missing: &Unsatisfied,
    answer: PromptAnswer,
    launcher: &mut dyn Launcher,
) -> Result<BlockReason, FlowError> {
    let requirement_id = missing.requirement_id.clone();
    match answer {
        PromptAnswer::Declined => {
            info!("用户拒绝安装: {}", missing.display_name);
            Ok(BlockReason::UserDeclined { requirement_id })
        }
        PromptAnswer::Accepted if missing.download_url.trim().is_empty() => {
            warn!("{} 未配置下载地址，无法启动安装", missing.display_name);
            Ok(BlockReason::PendingExternalInstall {
                requirement_id,
                launched: false,
            })
        }
        PromptAnswer::Accepted => {
            info!("启动安装: {} <- {}", missing.display_name, missing.download_url);
            launcher
                .launch(&missing.download_url)
                .map_err(|cause| FlowError::Launch {
                    url: missing.download_url.clone(),
                    cause,
                })?;
            Ok(BlockReason::PendingExternalInstall {
                requirement_id,
                launched: true,
            })
        }
    }
}

/// 展开环境变量配置中的占位符。
///
/// 异常处理：
/// - 任一项展开失败返回 [`FlowError::Placeholder`]
pub fn expand_env_specs<F>(specs: &[EnvSpec], lookup: F) -> Result<Vec<EnvSpec>, FlowError>
where
    F: Fn(&str) -> Option<String>,
{
    specs
        .iter()
        .map(|spec| {
            let value = expand_placeholders(&spec.value, &lookup).map_err(|source| {
                FlowError::Placeholder {
                    variable: spec.variable.clone(),
                    source,
                }
            })?;
            Ok(EnvSpec {
                value,
                ..spec.clone()
            })
        })
        .collect()
}

/// 配置环境变量（先展开占位符，再按顺序写入）。
///
/// 异常处理：
/// - 占位符无效返回 [`FlowError::Placeholder`]（此时不会写入任何一项）
/// - 写入失败返回 [`FlowError::Persist`]
pub fn configure_environment<F>(
    specs: &[EnvSpec],
    lookup: F,
    store: &mut dyn EnvStore,
) -> Result<Vec<EnvReport>, FlowError>
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = expand_env_specs(specs, lookup)?;
    Ok(apply_env_specs(store, &expanded)?)
}

/// 完整流程需要的外部协作者。
pub struct FlowContext<'a, F> {
    pub source: &'a dyn InventorySource,
    pub prompter: &'a mut dyn Prompter,
    pub launcher: &'a mut dyn Launcher,
    pub store: &'a mut dyn EnvStore,
    /// 占位符取值函数。
    pub lookup: F,
}

/// 执行完整流程。
///
/// 参数：
/// - `manifest`：已校验的清单
/// - `ctx`：外部协作者
///
/// 返回值：
/// - [`FlowOutcome::Success`]：全部满足且环境变量已配置
/// - [`FlowOutcome::Blocked`]：第一个未满足的依赖导致本次运行终止
///
/// 异常处理：
/// - 持久化失败、提示失败、启动失败返回 [`FlowError`]，并记录错误日志
pub fn run<F>(manifest: &PrereqManifest, ctx: FlowContext<'_, F>) -> Result<FlowOutcome, FlowError>
where
    F: Fn(&str) -> Option<String>,
{
    info!("开始检查前置依赖: {} {}", manifest.product_name, manifest.version);
    let result = run_inner(manifest, ctx);
    match &result {
        Ok(FlowOutcome::Success { .. }) => info!("前置依赖检查完成，环境变量已配置"),
        Ok(FlowOutcome::Blocked(reason)) => warn!("前置依赖未满足，本次运行终止: {reason:?}"),
        Err(e) => error!("前置依赖处理失败: {e}"),
    }
    result
}

fn run_inner<F>(manifest: &PrereqManifest, ctx: FlowContext<'_, F>) -> Result<FlowOutcome, FlowError>
where
    F: Fn(&str) -> Option<String>,
{
    let FlowContext {
        source,
        prompter,
        launcher,
        store,
        lookup,
    } = ctx;

    let resolution = resolve_requirements(manifest, source, ResolutionPolicy::FirstUnmet)?;
    match resolution.status() {
        ResolutionStatus::AllSatisfied => {
            let environment = configure_environment(&manifest.environment, lookup, store)?;
            Ok(FlowOutcome::Success { environment })
        }
        ResolutionStatus::Blocked(missing) => {
            let answer = prompter
                .confirm(PROMPT_TITLE, &missing.prompt_message)
                .map_err(FlowError::Prompt)?;
            let reason = remediate(missing, answer, launcher)?;
            Ok(FlowOutcome::Blocked(reason))
        }
    }
}
