//! 依赖匹配：名称规则 + 最低版本。
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use regex::{Regex, RegexBuilder};

use crate::inventory::InventoryRecord;
use crate::manifest::{ManifestError, MatchRule, Requirement};
use crate::version::VersionValue;

/// 预编译的依赖匹配器。
#[derive(Debug, Clone)]
pub struct RequirementMatcher {
    rule: NameRule,
    min_version: VersionValue,
}

#[derive(Debug, Clone)]
enum NameRule {
    /// 已转小写的子串。
    Contains(String),
    Regex(Regex),
}

impl RequirementMatcher {
    /// 编译依赖的名称规则。
    ///
    /// 异常处理：
    /// - 模式为空或正则无法编译时返回 [`ManifestError`]
    pub fn compile(req: &Requirement) -> Result<Self, ManifestError> {
        if req.pattern.is_empty() {
            return Err(ManifestError::EmptyPattern { id: req.id.clone() });
        }
        let rule = match req.match_rule {
            MatchRule::ExactName => NameRule::Contains(req.pattern.to_lowercase()),
            MatchRule::Regex => NameRule::Regex(
                RegexBuilder::new(&req.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ManifestError::BadPattern {
                        id: req.id.clone(),
                        source,
                    })?,
            ),
        };
        Ok(Self {
            rule,
            min_version: req.min_version.clone(),
        })
    }

    /// 仅判断名称是否匹配（不看版本）。
    pub fn name_matches(&self, name: &str) -> bool {
        match &self.rule {
            NameRule::Contains(needle) => name.to_lowercase().contains(needle.as_str()),
            NameRule::Regex(re) => re.is_match(name),
        }
    }

    /// 判断记录是否满足依赖（名称匹配且 `record.version >= min_version`）。
    pub fn matches(&self, record: &InventoryRecord) -> bool {
        self.name_matches(&record.name) && record.version.satisfies_min(&self.min_version)
    }
}
