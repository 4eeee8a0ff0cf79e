//! 路径约定与占位符展开。
//!
//! 目标：
//! - 清单中的环境变量值使用 `{ProgramFiles}` 等占位符，避免写死盘符
//! - 展开时的变量来源可注入（默认读取进程环境变量），便于测试
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::PathBuf;

use anyhow::{Context, Result};
use thiserror::Error;

/// 清单文件的默认名称。
pub const MANIFEST_FILE: &str = "prereq-manifest.json";

/// 占位符展开错误。
#[derive(Debug, Error)]
pub enum PlaceholderError {
    #[error("未知的占位符: {{{0}}}")]
    Unknown(String),
    #[error("占位符未闭合: {0}")]
    Unterminated(String),
    #[error("占位符展开结果为空: {0}")]
    Empty(String),
}

/// 展开字符串中的 `{Name}` 占位符。
///
/// 参数：
/// - `raw`：原始字符串（例如 `{ProgramFiles}\Swagd\lib`）
/// - `lookup`：占位符取值函数（返回 `None` 表示未知）
///
/// 返回值：
/// - 展开后的字符串
///
/// 异常处理：
/// - 未知占位符、未闭合的 `{`、或展开后为空时返回错误
pub fn expand_placeholders<F>(raw: &str, lookup: F) -> Result<String, PlaceholderError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| PlaceholderError::Unterminated(raw.to_string()))?;
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| PlaceholderError::Unknown(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    if out.trim().is_empty() {
        return Err(PlaceholderError::Empty(raw.to_string()));
    }
    Ok(out)
}

/// 以进程环境变量作为占位符来源。
///
/// 说明：
/// - 空值视为未知，避免生成 `\Swagd\lib` 这类相对路径
pub fn process_env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// 获取 Program Files 目录。
///
/// 异常处理：
/// - 环境变量 `ProgramFiles` 不存在或不可读时返回错误
pub fn program_files_dir() -> Result<PathBuf> {
    let dir = std::env::var("ProgramFiles").context("读取 ProgramFiles 环境变量失败")?;
    Ok(PathBuf::from(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "ProgramFiles" => Some(r"C:\Program Files".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_placeholders() {
        assert_eq!(
            expand_placeholders(r"{ProgramFiles}\Swagd\lib", lookup).unwrap(),
            r"C:\Program Files\Swagd\lib"
        );
        assert_eq!(expand_placeholders(r"C:\plain", lookup).unwrap(), r"C:\plain");
    }

    #[test]
    fn rejects_unknown_and_unterminated() {
        assert!(matches!(
            expand_placeholders(r"{Nope}\x", lookup),
            Err(PlaceholderError::Unknown(n)) if n == "Nope"
        ));
        assert!(matches!(
            expand_placeholders(r"{ProgramFiles\x", lookup),
            Err(PlaceholderError::Unterminated(_))
        ));
        assert!(matches!(expand_placeholders("", lookup), Err(PlaceholderError::Empty(_))));
    }
}
