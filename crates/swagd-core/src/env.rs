//! 环境变量配置（幂等）。
//!
//! 写入方式：
//! - `SetIfAbsent`：变量不存在或为空时写入，已有值永不覆盖
//! - `AppendToPathIfMissing`：按 `;` 切分，忽略大小写精确比较（不是子串），缺失时追加；
//!   原值为空时不会引入前导分隔符
//!
//! 持久化：
//! - 通过 [`EnvStore`] 写入（机器级注册表实现位于 `swagd-windows`）
//! - 写入失败是整个流程的终止条件，并以 [`EnvError::Persist`] 与“依赖未满足”区分
//! - 不做回滚：中途失败时已写入的项保持原样
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::manifest::{EnvMode, EnvSpec};

/// 路径列表分隔符（Windows 语义）。
pub const PATH_DELIMITER: char = ';';

/// 环境变量存储错误。
#[derive(Debug, Error)]
pub enum EnvError {
    /// 读取失败。
    #[error("读取环境变量失败 {name}: {reason}")]
    Read { name: String, reason: String },
    /// 持久化失败（常见原因：权限不足）。
    #[error("写入环境变量失败 {name}: {reason}")]
    Persist { name: String, reason: String },
}

/// 环境变量存储（外部协作者）。
pub trait EnvStore {
    /// 读取持久化的值；不存在时返回 `None`。
    fn get(&self, name: &str) -> Result<Option<String>, EnvError>;
    /// 持久化写入。
    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError>;
}

impl<T: EnvStore + ?Sized> EnvStore for Box<T> {
    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        (**self).get(name)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError> {
        (**self).set(name, value)
    }
}

/// 单项配置的执行结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvOutcome {
    /// 变量原本不存在/为空，已写入。
    Set,
    /// 变量已有值，未改动。
    AlreadySet,
    /// 路径段已追加。
    Appended,
    /// 路径段已存在，未改动。
    AlreadyPresent,
}

/// 单项配置的执行报告。
#[derive(Debug, Clone, Serialize)]
pub struct EnvReport {
    pub variable: String,
    pub value: String,
    pub outcome: EnvOutcome,
}

/// 切分路径列表（忽略空段与首尾空白）。
pub fn split_path_list(raw: &str) -> Vec<&str> {
    raw.split(PATH_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// 判断路径列表中是否已包含指定条目（忽略大小写、精确匹配）。
pub fn path_list_contains(raw: &str, entry: &str) -> bool {
    let needle = entry.trim().to_lowercase();
    split_path_list(raw)
        .iter()
        .any(|p| p.to_lowercase() == needle)
}

/// 将条目追加到路径列表末尾，保证不产生前导或重复的分隔符。
///
/// 说明：
/// - 已有条目保持原样（包括条目末尾的空白），只在末尾追加 `;entry`
/// - 原值以 `;` 结尾时直接接在分隔符后
pub fn append_path_entry(raw: &str, entry: &str) -> String {
    let trimmed = raw.trim_end();
    if trimmed.is_empty() {
        return entry.to_string();
    }
    if trimmed.ends_with(PATH_DELIMITER) {
        format!("{trimmed}{entry}")
    } else {
        format!("{raw}{PATH_DELIMITER}{entry}")
    }
}

/// 应用单项配置。
///
/// 参数：
/// - `store`：环境变量存储
/// - `spec`：配置项（`value` 须已完成占位符展开）
///
/// 异常处理：
/// - 读取/写入失败时返回 [`EnvError`]
pub fn apply_env_spec(store: &mut dyn EnvStore, spec: &EnvSpec) -> Result<EnvReport, EnvError> {
    let current = store.get(&spec.variable)?;
    let outcome = match spec.mode {
        EnvMode::SetIfAbsent => match current.as_deref() {
            Some(v) if !v.trim().is_empty() => EnvOutcome::AlreadySet,
            _ => {
                store.set(&spec.variable, &spec.value)?;
                EnvOutcome::Set
            }
        },
        EnvMode::AppendToPathIfMissing => {
            let current = current.unwrap_or_default();
            if path_list_contains(&current, &spec.value) {
                EnvOutcome::AlreadyPresent
            } else {
                store.set(&spec.variable, &append_path_entry(&current, &spec.value))?;
                EnvOutcome::Appended
            }
        }
    };
    Ok(EnvReport {
        variable: spec.variable.clone(),
        value: spec.value.clone(),
        outcome,
    })
}

/// 按顺序应用全部配置项。
///
/// 异常处理：
/// - 任一项失败立即返回错误；此前已写入的项不会回滚
pub fn apply_env_specs(
    store: &mut dyn EnvStore,
    specs: &[EnvSpec],
) -> Result<Vec<EnvReport>, EnvError> {
    let mut reports = Vec::with_capacity(specs.len());
    for spec in specs {
        match apply_env_spec(store, spec) {
            Ok(report) => {
                info!(
                    "环境变量 {} <- {}: {:?}",
                    report.variable, report.value, report.outcome
                );
                reports.push(report);
            }
            Err(e) => {
                if !reports.is_empty() {
                    warn!("环境变量配置中途失败，已写入的 {} 项不会回滚", reports.len());
                }
                return Err(e);
            }
        }
    }
    Ok(reports)
}

/// 内存环境变量存储（变量名忽略大小写）。
///
/// 用途：
/// - 测试中的假存储
/// - CLI 快照文件的读写载体（JSON 对象）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryEnvStore {
    vars: BTreeMap<String, String>,
}

impl MemoryEnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        let _ = self.set(name, value);
        self
    }

    /// 当前全部变量（按名称排序）。
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn key_for(&self, name: &str) -> Option<&String> {
        self.vars.keys().find(|k| k.eq_ignore_ascii_case(name))
    }
}

impl EnvStore for MemoryEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        Ok(self.key_for(name).and_then(|k| self.vars.get(k)).cloned())
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError> {
        let key = self.key_for(name).cloned().unwrap_or_else(|| name.to_string());
        self.vars.insert(key, value.to_string());
        Ok(())
    }
}
