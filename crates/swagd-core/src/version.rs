//! 版本值模型与比较规则。
//!
//! 两种表示：
//! - `Dotted`：点分数字字符串（例如 `1.11.1`），按分量逐个以整数比较，缺失的尾部分量视为 0
//! - `Packed`：注册表 `Version` 字段的打包整数（`major << 24 | minor << 16 | build`），直接按无符号整数比较
//!
//! 约定：
//! - 点分版本绝不退化为字典序比较（否则 `1.2` 会被错误地排在 `1.11` 之后）
//! - 不同表示之间不可比较（返回 `None`），由清单校验保证同一表示
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 版本值。
///
/// 序列化格式：
/// - JSON 字符串反序列化为 [`VersionValue::Dotted`]
/// - JSON 数字反序列化为 [`VersionValue::Packed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionValue {
    /// 打包整数版本（注册表 DWORD）。
    Packed(u32),
    /// 点分数字版本字符串（原样保存，比较时解析）。
    Dotted(String),
}

/// 版本表示类型（用于校验与诊断输出）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRepr {
    Packed,
    Dotted,
}

impl VersionValue {
    /// 当前值的表示类型。
    pub fn repr(&self) -> VersionRepr {
        match self {
            VersionValue::Packed(_) => VersionRepr::Packed,
            VersionValue::Dotted(_) => VersionRepr::Dotted,
        }
    }

    /// 是否为“零版本”。
    ///
    /// 返回值：
    /// - `Packed(0)`，或所有分量均为 0 的点分版本：`true`
    /// - 无法解析的点分版本：`false`
    pub fn is_zero(&self) -> bool {
        match self {
            VersionValue::Packed(v) => *v == 0,
            VersionValue::Dotted(s) => parse_components(s)
                .map(|parts| parts.iter().all(|p| *p == 0))
                .unwrap_or(false),
        }
    }

    /// 比较两个版本值。
    ///
    /// 返回值：
    /// - 同为 `Packed`：无符号整数比较结果
    /// - 同为 `Dotted` 且都能解析：逐分量整数比较结果（缺失分量视为 0）
    /// - 表示不同，或任一点分版本无法解析：`None`
    pub fn compare(&self, other: &VersionValue) -> Option<Ordering> {
        match (self, other) {
            (VersionValue::Packed(a), VersionValue::Packed(b)) => Some(a.cmp(b)),
            (VersionValue::Dotted(a), VersionValue::Dotted(b)) => {
                let a = parse_components(a)?;
                let b = parse_components(b)?;
                Some(compare_components(&a, &b))
            }
            _ => None,
        }
    }

    /// 判断当前版本是否满足最低版本要求（`self >= min`）。
    ///
    /// 规则：
    /// - 最低版本为零版本时，任何记录都满足（包括空/无法解析的版本）
    /// - 否则必须可比较且不小于最低版本；不可比较视为不满足
    pub fn satisfies_min(&self, min: &VersionValue) -> bool {
        if min.is_zero() {
            return true;
        }
        matches!(
            self.compare(min),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        )
    }

    /// 将打包整数拆分为 `(major, minor, build)`。
    pub fn unpack(packed: u32) -> (u32, u32, u32) {
        (packed >> 24, (packed >> 16) & 0xff, packed & 0xffff)
    }
}

impl fmt::Display for VersionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionValue::Packed(v) => {
                let (major, minor, build) = VersionValue::unpack(*v);
                write!(f, "{major}.{minor}.{build} (0x{v:08x})")
            }
            VersionValue::Dotted(s) => f.write_str(s),
        }
    }
}

/// 解析点分版本字符串为数字分量。
///
/// 规则：
/// - 按 `.` 切分，每个分量取前导数字（`"3b"` 取 `3`）
/// - 空字符串、空分量或分量不以数字开头：返回 `None`
pub fn parse_components(raw: &str) -> Option<Vec<u64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.split('.')
        .map(|part| {
            let digits: String = part
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.is_empty() {
                None
            } else {
                digits.parse::<u64>().ok()
            }
        })
        .collect()
}

fn compare_components(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
