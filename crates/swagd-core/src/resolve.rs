//! 依赖解析（纯计算，无 IO、无用户交互）。
//!
//! 规则：
//! - 按声明顺序处理依赖；每个依赖按配置的范围优先级查找，任一范围命中即视为已满足
//! - 默认策略 [`ResolutionPolicy::FirstUnmet`]：遇到第一个未满足的依赖即停止，
//!   其后的依赖不做评估、不产生提示，整体结果为“阻塞”
//! - [`ResolutionPolicy::Exhaustive`] 仅用于诊断输出，评估全部依赖
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use serde::Serialize;
use tracing::debug;

use crate::inventory::{Inventory, InventoryScope};
use crate::manifest::{ManifestError, Requirement};
use crate::matcher::RequirementMatcher;

/// 解析策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    #[default]
    /// 遇到第一个未满足的依赖即停止。
    FirstUnmet,
    /// 评估全部依赖。
    Exhaustive,
}

/// 已满足的依赖及命中的记录。
#[derive(Debug, Clone, Serialize)]
pub struct Satisfied {
    pub requirement_id: String,
    pub scope: InventoryScope,
    pub record_name: String,
    pub record_version: String,
}

/// 未满足的依赖及应向用户展示的处理信息。
#[derive(Debug, Clone, Serialize)]
pub struct Unsatisfied {
    pub requirement_id: String,
    pub display_name: String,
    /// 提示文本（若在备用范围中发现匹配，则为备用提示文本）。
    pub prompt_message: String,
    /// 下载地址（原样透传）。
    pub download_url: String,
    /// 在备用范围中发现匹配时对应的范围。
    pub alternate_found: Option<InventoryScope>,
}

/// 一次解析的结果（创建后不可变）。
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    satisfied: Vec<Satisfied>,
    unsatisfied: Vec<Unsatisfied>,
    not_evaluated: Vec<String>,
}

/// 解析结论。
#[derive(Debug, Clone, Copy)]
pub enum ResolutionStatus<'a> {
    /// 全部满足。
    AllSatisfied,
    /// 被第一个未满足的依赖阻塞。
    Blocked(&'a Unsatisfied),
}

impl ResolutionResult {
    pub fn satisfied(&self) -> &[Satisfied] {
        &self.satisfied
    }

    /// 未满足的依赖（声明顺序）。
    pub fn unsatisfied(&self) -> &[Unsatisfied] {
        &self.unsatisfied
    }

    /// 因提前停止而未评估的依赖 ID。
    pub fn not_evaluated(&self) -> &[String] {
        &self.not_evaluated
    }

    pub fn status(&self) -> ResolutionStatus<'_> {
        match self.unsatisfied.first() {
            Some(first) => ResolutionStatus::Blocked(first),
            None => ResolutionStatus::AllSatisfied,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.unsatisfied.is_empty()
    }
}

/// 解析全部依赖。
///
/// 参数：
/// - `requirements`：依赖列表（声明顺序）
/// - `scopes`：主范围（优先级顺序）
/// - `inventory`：本次读取到的清单
/// - `policy`：解析策略
///
/// 异常处理：
/// - 依赖的匹配模式无法编译时返回错误（正常情况下已由清单校验拦截）
pub fn resolve(
    requirements: &[Requirement],
    scopes: &[InventoryScope],
    inventory: &Inventory,
    policy: ResolutionPolicy,
) -> Result<ResolutionResult, ManifestError> {
    let mut result = ResolutionResult {
        satisfied: Vec::new(),
        unsatisfied: Vec::new(),
        not_evaluated: Vec::new(),
    };

    for (index, req) in requirements.iter().enumerate() {
        let matcher = RequirementMatcher::compile(req)?;

        let hit = scopes.iter().find_map(|scope| {
            inventory
                .records(*scope)
                .iter()
                .find(|r| matcher.matches(r))
                .map(|r| (*scope, r))
        });

        if let Some((scope, record)) = hit {
            debug!("依赖已满足: {} <- {} [{}]", req.id, record.name, scope);
            result.satisfied.push(Satisfied {
                requirement_id: req.id.clone(),
                scope,
                record_name: record.name.clone(),
                record_version: record.version.to_string(),
            });
            continue;
        }

        let alternate_found = req.alternate.as_ref().and_then(|alt| {
            alt.scopes
                .iter()
                .copied()
                .find(|scope| inventory.records(*scope).iter().any(|r| matcher.matches(r)))
        });
        let prompt_message = match (&req.alternate, alternate_found) {
            (Some(alt), Some(_)) => alt.prompt_message.clone(),
            _ => req.remediation.prompt_message.clone(),
        };
        debug!("依赖未满足: {} (备用范围命中: {:?})", req.id, alternate_found);
        result.unsatisfied.push(Unsatisfied {
            requirement_id: req.id.clone(),
            display_name: req.label().to_string(),
            prompt_message,
            download_url: req.remediation.download_url.clone(),
            alternate_found,
        });

        if policy == ResolutionPolicy::FirstUnmet {
            result.not_evaluated = requirements[index + 1..]
                .iter()
                .map(|r| r.id.clone())
                .collect();
            break;
        }
    }

    Ok(result)
}
