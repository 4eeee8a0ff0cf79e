//! 前置依赖清单（prereq-manifest.json）模型定义与校验。
//!
//! 该模块描述一次解析/配置流程需要的全部输入：
//! - 产品信息（名称/版本）
//! - 清单读取配置（枚举范围与优先级、版本字段）
//! - 前置依赖列表（名称匹配规则、最低版本、缺失时的提示与下载地址）
//! - 环境变量配置（仅在缺失时写入 / 追加 PATH 段）
//!
//! 约定：
//! - 大部分字段通过 `#[serde(default)]` 提供默认值，以便清单向前兼容
//! - 该模块仅定义数据结构与静态校验，不执行任何 IO/系统修改
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::{InventoryScope, VersionField};
use crate::matcher::RequirementMatcher;
use crate::version::{VersionRepr, VersionValue};

/// 清单根对象（对应 `prereq-manifest.json`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrereqManifest {
    /// 产品显示名称（用于日志与提示标题）。
    pub product_name: String,
    #[serde(default)]
    /// 版本号（用于展示/审计）。
    pub version: String,
    #[serde(default)]
    /// 清单读取配置。
    pub inventory: InventoryConfig,
    #[serde(default)]
    /// 前置依赖（按声明顺序解析与提示）。
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    /// 全部依赖满足后写入的环境变量。
    pub environment: Vec<EnvSpec>,
}

/// 清单读取配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_scopes")]
    /// 参与解析的范围，顺序即优先级。
    pub scopes: Vec<InventoryScope>,
    #[serde(default)]
    /// 版本字段（决定记录与最低版本使用的表示）。
    pub version_field: VersionField,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
            version_field: VersionField::default(),
        }
    }
}

fn default_scopes() -> Vec<InventoryScope> {
    vec![InventoryScope::Machine64]
}

/// 单个前置依赖定义。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    /// 依赖 ID（唯一）。
    pub id: String,
    #[serde(default)]
    /// 显示名称；为空时使用 `id`。
    pub display_name: String,
    #[serde(default)]
    /// 名称匹配规则。
    pub match_rule: MatchRule,
    /// 匹配模式（子串或正则，均忽略大小写）。
    pub pattern: String,
    /// 最低版本（表示须与 `inventory.version_field` 一致）。
    pub min_version: VersionValue,
    /// 缺失时的处理方式。
    pub remediation: Remediation,
    #[serde(default)]
    /// 备用范围提示（例如仅检测到 32 位安装时给出不同的提示）。
    pub alternate: Option<AlternateRemediation>,
}

impl Requirement {
    /// 用于展示的名称。
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

/// 名称匹配规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// 忽略大小写的子串包含。
    ExactName,
    #[default]
    /// 忽略大小写的正则搜索（不隐含锚定）。
    Regex,
}

/// 缺失依赖的处理方式。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    /// 询问用户是否安装的提示文本。
    pub prompt_message: String,
    #[serde(default)]
    /// 安装包下载地址（原样传递；为空表示无可用下载）。
    pub download_url: String,
}

/// 备用范围检测。
///
/// 说明：
/// - 备用范围中的匹配记录不会使依赖变为“已满足”，只替换提示文本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternateRemediation {
    /// 备用范围。
    pub scopes: Vec<InventoryScope>,
    /// 在备用范围中发现匹配时使用的提示文本。
    pub prompt_message: String,
}

/// 环境变量配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    /// 变量名。
    pub variable: String,
    /// 期望值（可含 `{ProgramFiles}` 等占位符）。
    pub value: String,
    /// 写入方式。
    pub mode: EnvMode,
}

/// 环境变量写入方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvMode {
    /// 仅在变量不存在或为空时写入。
    SetIfAbsent,
    /// 作为路径段追加（已存在则跳过）。
    AppendToPathIfMissing,
}

/// 清单校验错误。
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("清单未配置任何清单范围")]
    NoScopes,
    #[error("依赖 ID 为空")]
    EmptyId,
    #[error("依赖 ID 重复: {0}")]
    DuplicateId(String),
    #[error("依赖 {id} 的匹配模式为空")]
    EmptyPattern { id: String },
    #[error("依赖 {id} 的正则表达式无效: {source}")]
    BadPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("依赖 {id} 的最低版本表示与清单版本字段 {field:?} 不一致")]
    VersionReprMismatch { id: String, field: VersionField },
    #[error("依赖 {id} 的最低版本无法解析: {version}")]
    BadMinVersion { id: String, version: String },
    #[error("环境变量配置缺少变量名（第 {index} 项）")]
    EmptyVariable { index: usize },
}

impl PrereqManifest {
    /// 静态校验清单。
    ///
    /// 检查项：
    /// - 至少一个清单范围
    /// - 依赖 ID 非空且唯一、匹配模式非空且可编译
    /// - 最低版本表示与 `inventory.version_field` 一致，点分版本可解析
    /// - 环境变量名非空
    ///
    /// 异常处理：
    /// - 返回遇到的第一个错误
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.inventory.scopes.is_empty() {
            return Err(ManifestError::NoScopes);
        }
        let expected = match self.inventory.version_field {
            VersionField::Packed => VersionRepr::Packed,
            VersionField::Display => VersionRepr::Dotted,
        };
        let mut ids = HashSet::new();
        for req in &self.requirements {
            if req.id.trim().is_empty() {
                return Err(ManifestError::EmptyId);
            }
            if !ids.insert(req.id.to_lowercase()) {
                return Err(ManifestError::DuplicateId(req.id.clone()));
            }
            RequirementMatcher::compile(req)?;
            if req.min_version.repr() != expected {
                return Err(ManifestError::VersionReprMismatch {
                    id: req.id.clone(),
                    field: self.inventory.version_field,
                });
            }
            if let VersionValue::Dotted(raw) = &req.min_version {
                if crate::version::parse_components(raw).is_none() {
                    return Err(ManifestError::BadMinVersion {
                        id: req.id.clone(),
                        version: raw.clone(),
                    });
                }
            }
        }
        for (index, spec) in self.environment.iter().enumerate() {
            if spec.variable.trim().is_empty() {
                return Err(ManifestError::EmptyVariable { index });
            }
        }
        Ok(())
    }

    /// 本次解析需要读取的全部范围（主范围在前，备用范围在后，去重）。
    pub fn scopes_to_read(&self) -> Vec<InventoryScope> {
        let mut out: Vec<InventoryScope> = Vec::new();
        let alternates = self
            .requirements
            .iter()
            .filter_map(|r| r.alternate.as_ref())
            .flat_map(|a| a.scopes.iter().copied());
        for scope in self.inventory.scopes.iter().copied().chain(alternates) {
            if !out.contains(&scope) {
                out.push(scope);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> PrereqManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    /// 验证省略字段时的默认值。
    fn defaults_apply_for_missing_sections() {
        let m = manifest(r#"{ "product_name": "SWAGD" }"#);
        assert_eq!(m.inventory.scopes, vec![InventoryScope::Machine64]);
        assert_eq!(m.inventory.version_field, VersionField::Packed);
        assert!(m.requirements.is_empty());
        assert!(m.validate().is_ok());
    }

    #[test]
    /// 验证最低版本表示与版本字段不一致时报错。
    fn rejects_version_repr_mismatch() {
        let m = manifest(
            r#"{
              "product_name": "SWAGD",
              "inventory": { "scopes": ["machine64"], "version_field": "display" },
              "requirements": [
                { "id": "gdal", "pattern": "gdal", "min_version": 16777216,
                  "remediation": { "prompt_message": "install gdal" } }
              ]
            }"#,
        );
        assert!(matches!(
            m.validate(),
            Err(ManifestError::VersionReprMismatch { .. })
        ));
    }

    #[test]
    fn rejects_bad_regex_and_duplicate_ids() {
        let bad = manifest(
            r#"{ "product_name": "x", "requirements": [
                { "id": "a", "pattern": "gdal(", "min_version": 1,
                  "remediation": { "prompt_message": "m" } } ] }"#,
        );
        assert!(matches!(bad.validate(), Err(ManifestError::BadPattern { .. })));

        let dup = manifest(
            r#"{ "product_name": "x", "requirements": [
                { "id": "a", "pattern": "a", "min_version": 1, "remediation": { "prompt_message": "m" } },
                { "id": "A", "pattern": "b", "min_version": 1, "remediation": { "prompt_message": "m" } } ] }"#,
        );
        assert!(matches!(dup.validate(), Err(ManifestError::DuplicateId(_))));
    }

    #[test]
    fn scopes_to_read_appends_alternates_once() {
        let m = manifest(
            r#"{ "product_name": "x",
                 "inventory": { "scopes": ["machine64", "current_user"] },
                 "requirements": [
                   { "id": "a", "pattern": "a", "min_version": 1,
                     "remediation": { "prompt_message": "m" },
                     "alternate": { "scopes": ["machine32", "machine64"], "prompt_message": "32" } } ] }"#,
        );
        assert_eq!(
            m.scopes_to_read(),
            vec![
                InventoryScope::Machine64,
                InventoryScope::CurrentUser,
                InventoryScope::Machine32
            ]
        );
    }
}
