//! 已安装软件清单（inventory）读取。
//!
//! 职责：
//! - 定义枚举范围（64 位/32 位系统注册项、当前用户）与版本字段选择
//! - 定义外部数据源接口 [`InventorySource`]，注册表实现位于 `swagd-windows`
//! - 将原始条目规范化为 [`InventoryRecord`]：跳过缺名称/缺版本的条目，按小写名称去重（先到先得）
//!
//! 异常处理：
//! - 数据源整体不可用时不报错，返回空清单并记录告警日志；
//!   上层因此可以把“未找到”和“数据源缺失”统一视为“依赖未满足”
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::version::VersionValue;

/// 清单枚举范围。
///
/// 枚举顺序即去重时的隐式优先级，由调用方（清单配置）声明。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryScope {
    /// HKLM 64 位视图。
    Machine64,
    /// HKLM 32 位视图（WOW6432Node）。
    Machine32,
    /// HKCU（当前用户安装）。
    CurrentUser,
}

impl InventoryScope {
    /// 全部范围（按默认优先级排列）。
    pub const ALL: [InventoryScope; 3] = [
        InventoryScope::Machine64,
        InventoryScope::Machine32,
        InventoryScope::CurrentUser,
    ];
}

impl fmt::Display for InventoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InventoryScope::Machine64 => "machine64",
            InventoryScope::Machine32 => "machine32",
            InventoryScope::CurrentUser => "current_user",
        })
    }
}

impl std::str::FromStr for InventoryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "machine64" => Ok(InventoryScope::Machine64),
            "machine32" => Ok(InventoryScope::Machine32),
            "current_user" | "user" => Ok(InventoryScope::CurrentUser),
            other => Err(format!("未知的清单范围: {other}")),
        }
    }
}

/// 从哪个字段读取版本。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionField {
    #[default]
    /// `Version`（DWORD 打包整数）。
    Packed,
    /// `DisplayVersion`（点分字符串）。
    Display,
}

/// 数据源返回的原始条目（尚未校验）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<VersionValue>,
}

impl RawEntry {
    pub fn new(name: impl Into<String>, version: VersionValue) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version),
        }
    }
}

/// 规范化后的清单记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRecord {
    /// 原始大小写的显示名称。
    pub name: String,
    /// 版本值。
    pub version: VersionValue,
}

/// 数据源错误。
#[derive(Debug, Error)]
pub enum InventoryError {
    /// 数据源无法打开（键不存在、权限不足、平台不支持等）。
    #[error("清单数据源不可用 ({scope}): {reason}")]
    Unavailable { scope: InventoryScope, reason: String },
}

/// 已安装软件数据源（外部协作者）。
pub trait InventorySource {
    /// 枚举指定范围内的全部原始条目。
    ///
    /// 参数：
    /// - `scope`：枚举范围
    /// - `field`：版本字段选择
    ///
    /// 异常处理：
    /// - 数据源整体不可用时返回 [`InventoryError::Unavailable`]；
    ///   单个条目损坏应以 `name/version = None` 表达，而不是返回错误
    fn enumerate(
        &self,
        scope: InventoryScope,
        field: VersionField,
    ) -> Result<Vec<RawEntry>, InventoryError>;
}

impl<T: InventorySource + ?Sized> InventorySource for Box<T> {
    fn enumerate(
        &self,
        scope: InventoryScope,
        field: VersionField,
    ) -> Result<Vec<RawEntry>, InventoryError> {
        (**self).enumerate(scope, field)
    }
}

/// 读取并规范化指定范围的清单。
///
/// 参数：
/// - `source`：数据源
/// - `scope`：枚举范围
/// - `field`：版本字段
///
/// 返回值：
/// - 去重后的记录（保持数据源枚举顺序）；数据源不可用时为空
pub fn read_inventory(
    source: &dyn InventorySource,
    scope: InventoryScope,
    field: VersionField,
) -> Vec<InventoryRecord> {
    let raw = match source.enumerate(scope, field) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("读取已安装软件清单失败，按空清单处理: {e}");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.len());
    for entry in raw {
        let (Some(name), Some(version)) = (entry.name, entry.version) else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        records.push(InventoryRecord { name, version });
    }
    debug!("清单范围 {scope}: {} 条记录", records.len());
    records
}

/// 一次解析过程中读取到的全部范围的清单。
///
/// 每次解析重新构建，不跨调用缓存（安装提示与确认之间注册表可能已变化）。
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    by_scope: BTreeMap<InventoryScope, Vec<InventoryRecord>>,
}

impl Inventory {
    /// 从数据源读取给定范围（每个范围只读取一次）。
    pub fn read(
        source: &dyn InventorySource,
        scopes: impl IntoIterator<Item = InventoryScope>,
        field: VersionField,
    ) -> Self {
        let mut inv = Inventory::default();
        for scope in scopes {
            if inv.by_scope.contains_key(&scope) {
                continue;
            }
            let records = read_inventory(source, scope, field);
            inv.by_scope.insert(scope, records);
        }
        inv
    }

    /// 直接插入某范围的记录（测试/诊断用）。
    pub fn insert(&mut self, scope: InventoryScope, records: Vec<InventoryRecord>) {
        self.by_scope.insert(scope, records);
    }

    /// 指定范围的记录；未读取的范围视为空。
    pub fn records(&self, scope: InventoryScope) -> &[InventoryRecord] {
        self.by_scope.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 内存快照数据源。
///
/// 用途：
/// - 单元/集成测试中的假清单
/// - CLI `--inventory-snapshot` 从 JSON 文件加载（键为范围名）
///
/// 快照中未出现的范围视为“数据源不可用”。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotSource {
    scopes: BTreeMap<InventoryScope, Vec<RawEntry>>,
}

impl SnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个条目（链式构造）。
    pub fn with_entry(mut self, scope: InventoryScope, entry: RawEntry) -> Self {
        self.scopes.entry(scope).or_default().push(entry);
        self
    }

    /// 声明某范围存在但为空。
    pub fn with_empty_scope(mut self, scope: InventoryScope) -> Self {
        self.scopes.entry(scope).or_default();
        self
    }
}

impl InventorySource for SnapshotSource {
    fn enumerate(
        &self,
        scope: InventoryScope,
        _field: VersionField,
    ) -> Result<Vec<RawEntry>, InventoryError> {
        self.scopes
            .get(&scope)
            .cloned()
            .ok_or_else(|| InventoryError::Unavailable {
                scope,
                reason: "快照中不包含该范围".to_string(),
            })
    }
}

/// 始终不可用的数据源（非 Windows 平台的默认实现）。
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    pub reason: String,
}

impl InventorySource for UnavailableSource {
    fn enumerate(
        &self,
        scope: InventoryScope,
        _field: VersionField,
    ) -> Result<Vec<RawEntry>, InventoryError> {
        Err(InventoryError::Unavailable {
            scope,
            reason: self.reason.clone(),
        })
    }
}
