//! 阻塞式“是/否”消息框。
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::Result;
use swagd_core::flow::{PromptAnswer, Prompter};
use windows::core::HSTRING;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxW, IDYES, MB_ICONQUESTION, MB_SETFOREGROUND, MB_YESNO,
};

/// 使用 `MessageBoxW` 的提示器。
///
/// 说明：
/// - 无父窗口；关闭对话框（Esc/右上角）按“否”处理
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageBoxPrompter;

impl Prompter for MessageBoxPrompter {
    fn confirm(&mut self, title: &str, message: &str) -> Result<PromptAnswer> {
        let text = HSTRING::from(message);
        let caption = HSTRING::from(title);
        let ret = unsafe {
            MessageBoxW(
                HWND::default(),
                &text,
                &caption,
                MB_YESNO | MB_ICONQUESTION | MB_SETFOREGROUND,
            )
        };
        Ok(if ret == IDYES {
            PromptAnswer::Accepted
        } else {
            PromptAnswer::Declined
        })
    }
}
