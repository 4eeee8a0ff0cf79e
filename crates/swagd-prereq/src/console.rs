//! 控制台“是/否”提示（`--console`）。
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::{Context, Result};
use dialoguer::Confirm;
use swagd_core::flow::{PromptAnswer, Prompter};

/// 基于 `dialoguer` 的终端提示器，默认回答“否”。
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn confirm(&mut self, title: &str, message: &str) -> Result<PromptAnswer> {
        eprintln!("[{title}]");
        let yes = Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .context("读取控制台输入失败")?;
        Ok(if yes {
            PromptAnswer::Accepted
        } else {
            PromptAnswer::Declined
        })
    }
}
