//! 启动外部安装（交给系统默认处理程序打开下载地址）。
//!
//! 说明：
//! - 只负责“发出请求”，不等待下载或安装完成
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::Result;
use swagd_core::flow::Launcher;
use tracing::info;

/// 使用系统 Shell 打开下载地址的启动器。
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    /// 打开下载地址。
    ///
    /// 异常处理：
    /// - Windows：`ShellExecuteW` 返回值不大于 32 视为失败
    /// - 其他平台：无法启动 `xdg-open` / `open` 时返回错误
    fn launch(&mut self, download_url: &str) -> Result<()> {
        info!("打开下载地址: {download_url}");
        open_url(download_url)
    }
}

#[cfg(windows)]
fn open_url(url: &str) -> Result<()> {
    use windows::core::{w, HSTRING, PCWSTR};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Shell::ShellExecuteW;
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    let target = HSTRING::from(url);
    let ret = unsafe {
        ShellExecuteW(
            HWND::default(),
            w!("open"),
            &target,
            PCWSTR::null(),
            PCWSTR::null(),
            SW_SHOWNORMAL,
        )
    };
    let code = ret.0 as isize;
    if code <= 32 {
        anyhow::bail!("ShellExecuteW 失败，返回码 {code}");
    }
    Ok(())
}

#[cfg(not(windows))]
fn open_url(url: &str) -> Result<()> {
    use anyhow::Context;

    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    std::process::Command::new(opener)
        .arg(url)
        .spawn()
        .with_context(|| format!("启动 {opener} 失败"))?;
    Ok(())
}

/// 只记录日志、不实际打开地址的启动器（演练/测试）。
#[derive(Debug, Default, Clone)]
pub struct LogOnlyLauncher {
    /// 已“启动”的地址，按调用顺序。
    pub launched: Vec<String>,
}

impl Launcher for LogOnlyLauncher {
    fn launch(&mut self, download_url: &str) -> Result<()> {
        info!("演练模式，未实际打开: {download_url}");
        self.launched.push(download_url.to_string());
        Ok(())
    }
}
