#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

//! SWAGD 前置依赖助手（桌面窗口）。
//!
//! 职责：
//! - 点击“检查依赖”后读取已安装软件，按清单解析前置依赖
//! - 缺失时在窗口内展示提示与“是/否”按钮，选择“是”则打开下载地址
//! - 全部满足时配置机器级环境变量，并展示每项的处理结果
//!
//! 说明：
//! - 与 `swagd-prereq` 共用 `swagd-core` 的解析与配置逻辑，只是提示方式不同
//! - 写入机器级环境变量需要以管理员权限运行
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui;
use tracing::{info, warn};

use swagd_core::flow::{self, BlockReason, PromptAnswer, PROMPT_TITLE};
use swagd_core::manifest::PrereqManifest;
use swagd_core::paths::{process_env_lookup, MANIFEST_FILE};
use swagd_core::resolve::{ResolutionPolicy, ResolutionStatus, Unsatisfied};
use swagd_windows::launcher::ShellLauncher;
use swagd_windows::platform;

/// 程序入口：初始化日志、读取清单并启动 GUI。
///
/// 异常处理：
/// - 清单读取失败不会阻止窗口启动，错误在窗口内展示
/// - GUI 启动失败返回错误
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_target(false)
        .init();

    let manifest_path = locate_manifest();
    let app = AssistantApp::new(load_manifest(&manifest_path));

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "SWAGD 前置依赖助手",
        options,
        Box::new(|_cc| Box::new(app)),
    )
    .map_err(|e| anyhow::anyhow!("启动 GUI 失败: {e}"))?;
    Ok(())
}

/// 查找清单文件：优先可执行文件所在目录，其次当前目录。
fn locate_manifest() -> PathBuf {
    match current_exe_dir() {
        Ok(dir) if dir.join(MANIFEST_FILE).exists() => dir.join(MANIFEST_FILE),
        _ => PathBuf::from(MANIFEST_FILE),
    }
}

fn current_exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("读取当前可执行文件路径失败")?;
    Ok(exe.parent().unwrap_or_else(|| Path::new(".")).to_path_buf())
}

/// 读取并校验清单。
///
/// 异常处理：
/// - 读取、解析或校验失败返回错误
fn load_manifest(path: &Path) -> Result<PrereqManifest> {
    let bytes = std::fs::read(path).with_context(|| format!("读取清单失败: {}", path.display()))?;
    let manifest: PrereqManifest = serde_json::from_slice(&bytes).context("解析清单 JSON 失败")?;
    manifest.validate().context("清单校验失败")?;
    Ok(manifest)
}

/// 窗口当前所处的阶段。
enum Stage {
    /// 等待用户点击“检查依赖”。
    Idle,
    /// 存在未满足的依赖，等待用户选择是否安装。
    Prompting(Unsatisfied),
    /// 本次处理结束，展示结果文本。
    Finished { ok: bool, lines: Vec<String> },
}

/// GUI 应用状态（eframe App）。
struct AssistantApp {
    manifest: Result<PrereqManifest>,
    stage: Stage,
}

impl AssistantApp {
    fn new(manifest: Result<PrereqManifest>) -> Self {
        if let Err(e) = &manifest {
            warn!("{e:#}");
        }
        Self {
            manifest,
            stage: Stage::Idle,
        }
    }

    /// 解析依赖；全部满足时直接配置环境变量。
    fn check(&mut self) {
        let Ok(manifest) = &self.manifest else {
            return;
        };
        let source = platform::default_inventory_source();
        let resolution =
            match flow::resolve_requirements(manifest, source.as_ref(), ResolutionPolicy::FirstUnmet) {
                Ok(r) => r,
                Err(e) => {
                    self.stage = failed(format!("{e}"));
                    return;
                }
            };
        self.stage = match resolution.status() {
            ResolutionStatus::Blocked(missing) => Stage::Prompting(missing.clone()),
            ResolutionStatus::AllSatisfied => configure(manifest),
        };
    }

    /// 处理用户对安装提示的回答。
    fn answer(&mut self, missing: &Unsatisfied, answer: PromptAnswer) {
        let mut launcher = ShellLauncher;
        self.stage = match flow::remediate(missing, answer, &mut launcher) {
            Ok(BlockReason::PendingExternalInstall { launched: true, .. }) => Stage::Finished {
                ok: false,
                lines: vec![
                    format!("已打开下载地址: {}", missing.download_url),
                    "安装完成后请重新检查".to_string(),
                ],
            },
            Ok(BlockReason::PendingExternalInstall { launched: false, .. }) => Stage::Finished {
                ok: false,
                lines: vec![format!("{} 没有可用的下载地址，请手动安装", missing.display_name)],
            },
            Ok(BlockReason::UserDeclined { .. }) => Stage::Finished {
                ok: false,
                lines: vec![format!("未安装 {}，无法继续", missing.display_name)],
            },
            Err(e) => failed(format!("{e}")),
        };
    }
}

fn failed(message: String) -> Stage {
    warn!("{message}");
    Stage::Finished {
        ok: false,
        lines: vec![message],
    }
}

/// 配置环境变量并生成结果文本。
fn configure(manifest: &PrereqManifest) -> Stage {
    let mut store = platform::default_env_store();
    match flow::configure_environment(&manifest.environment, process_env_lookup, store.as_mut()) {
        Ok(reports) => {
            info!("前置依赖已全部满足，环境变量已配置");
            let mut lines = vec!["前置依赖已全部满足".to_string()];
            lines.extend(
                reports
                    .iter()
                    .map(|r| format!("{} = {:?} ({})", r.variable, r.outcome, r.value)),
            );
            Stage::Finished { ok: true, lines }
        }
        Err(e) => failed(format!("{e}")),
    }
}

impl eframe::App for AssistantApp {
    /// GUI 渲染与交互逻辑（每帧调用）。
    ///
    /// 实现要点：
    /// - 顶部栏展示产品名与“检查依赖”按钮
    /// - 中央区域按阶段展示提示或结果
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut clicked_check = false;
        let mut answered: Option<(Unsatisfied, PromptAnswer)> = None;

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.manifest {
                    Ok(m) => ui.heading(format!("{} {}", m.product_name, m.version)),
                    Err(_) => ui.heading("SWAGD"),
                };
                let enabled = self.manifest.is_ok() && !matches!(self.stage, Stage::Prompting(_));
                if ui.add_enabled(enabled, egui::Button::new("检查依赖")).clicked() {
                    clicked_check = true;
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Err(e) = &self.manifest {
                ui.colored_label(egui::Color32::RED, format!("{e:#}"));
                return;
            }
            match &self.stage {
                Stage::Idle => {
                    ui.label("点击“检查依赖”开始");
                }
                Stage::Prompting(missing) => {
                    ui.group(|ui| {
                        ui.strong(PROMPT_TITLE);
                        ui.label(missing.prompt_message.as_str());
                        ui.horizontal(|ui| {
                            if ui.button("是").clicked() {
                                answered = Some((missing.clone(), PromptAnswer::Accepted));
                            }
                            if ui.button("否").clicked() {
                                answered = Some((missing.clone(), PromptAnswer::Declined));
                            }
                        });
                    });
                }
                Stage::Finished { ok, lines } => {
                    let color = if *ok {
                        egui::Color32::DARK_GREEN
                    } else {
                        egui::Color32::RED
                    };
                    for line in lines {
                        ui.colored_label(color, line.as_str());
                    }
                }
            }
        });

        if clicked_check {
            self.check();
        }
        if let Some((missing, answer)) = answered {
            self.answer(&missing, answer);
        }
    }
}
