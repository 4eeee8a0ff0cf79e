//! 注册表读写：已安装软件枚举与机器级环境变量。
//!
//! 主要用途：
//! - 枚举 `Uninstall` 键下的已安装软件（64 位视图 / 32 位视图 / 当前用户）
//! - 读写机器级环境变量（`Session Manager\Environment`），写入后广播 `WM_SETTINGCHANGE`
//!
//! 权限要求：
//! - 读取 Uninstall 键通常不需要管理员
//! - 写入 HKLM 环境变量需要管理员权限；拒绝访问以 [`EnvError::Persist`] 返回
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use swagd_core::env::{EnvError, EnvStore};
use swagd_core::inventory::{InventoryError, InventoryScope, InventorySource, RawEntry, VersionField};
use swagd_core::version::VersionValue;
use tracing::{debug, warn};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
};
use winreg::enums::{
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_READ, KEY_SET_VALUE,
    KEY_WOW64_32KEY, KEY_WOW64_64KEY, REG_EXPAND_SZ, REG_SZ,
};
use winreg::{RegKey, RegValue, HKEY};

/// 已安装软件列表所在的子键。
pub const UNINSTALL_KEY: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall";

/// 机器级环境变量所在的子键（HKLM）。
pub const MACHINE_ENV_KEY: &str = "SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Environment";

/// 基于注册表 Uninstall 键的已安装软件数据源。
#[derive(Debug, Clone)]
pub struct RegistryInventorySource {
    uninstall_key: String,
}

impl Default for RegistryInventorySource {
    fn default() -> Self {
        Self {
            uninstall_key: UNINSTALL_KEY.to_string(),
        }
    }
}

impl RegistryInventorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义子键（测试时指向 HKCU 下的临时键）。
    pub fn with_uninstall_key(key: impl Into<String>) -> Self {
        Self {
            uninstall_key: key.into(),
        }
    }

    /// 打开指定范围对应的 Uninstall 键。
    fn open_root(&self, scope: InventoryScope) -> std::io::Result<RegKey> {
        match scope {
            InventoryScope::Machine64 => RegKey::predef(HKEY_LOCAL_MACHINE)
                .open_subkey_with_flags(&self.uninstall_key, KEY_READ | KEY_WOW64_64KEY),
            InventoryScope::Machine32 => RegKey::predef(HKEY_LOCAL_MACHINE)
                .open_subkey_with_flags(&self.uninstall_key, KEY_READ | KEY_WOW64_32KEY),
            InventoryScope::CurrentUser => {
                RegKey::predef(HKEY_CURRENT_USER).open_subkey_with_flags(&self.uninstall_key, KEY_READ)
            }
        }
    }
}

impl InventorySource for RegistryInventorySource {
    /// 枚举 Uninstall 键下的全部子键。
    ///
    /// 说明：
    /// - 无法打开的子键、缺少 `DisplayName` 或版本字段的子键以 `None` 字段返回，由上层跳过
    ///
    /// 异常处理：
    /// - 根键无法打开时返回 [`InventoryError::Unavailable`]
    fn enumerate(
        &self,
        scope: InventoryScope,
        field: VersionField,
    ) -> Result<Vec<RawEntry>, InventoryError> {
        let root = self.open_root(scope).map_err(|e| InventoryError::Unavailable {
            scope,
            reason: format!("打开注册表键失败 {}: {e}", self.uninstall_key),
        })?;

        let mut entries = Vec::new();
        for name in root.enum_keys() {
            let name = match name {
                Ok(n) => n,
                Err(e) => {
                    debug!("枚举子键失败，跳过: {e}");
                    continue;
                }
            };
            let Ok(sub) = root.open_subkey_with_flags(&name, KEY_QUERY_VALUE) else {
                continue;
            };
            entries.push(RawEntry {
                name: sub.get_value::<String, _>("DisplayName").ok(),
                version: read_version(&sub, field),
            });
        }
        debug!("注册表 {scope}: 枚举到 {} 个子键", entries.len());
        Ok(entries)
    }
}

/// 读取版本字段。
///
/// 规则：
/// - `Packed`：读取 `Version` DWORD；若以字符串存储则按十进制整数解析
/// - `Display`：读取 `DisplayVersion` 字符串，空字符串视为缺失
fn read_version(key: &RegKey, field: VersionField) -> Option<VersionValue> {
    match field {
        VersionField::Packed => key
            .get_value::<u32, _>("Version")
            .ok()
            .or_else(|| {
                key.get_value::<String, _>("Version")
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok())
            })
            .map(VersionValue::Packed),
        VersionField::Display => key
            .get_value::<String, _>("DisplayVersion")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(VersionValue::Dotted),
    }
}

/// 基于注册表的环境变量存储。
///
/// 说明：
/// - [`RegistryEnvStore::machine`] 指向 HKLM 机器级环境变量
/// - 写入时保留原有 `REG_EXPAND_SZ` 类型；新值含 `%` 时也使用 `REG_EXPAND_SZ`
#[derive(Debug, Clone)]
pub struct RegistryEnvStore {
    hive: HKEY,
    key: String,
    broadcast: bool,
}

impl RegistryEnvStore {
    /// 机器级环境变量存储（写入需要管理员权限）。
    pub fn machine() -> Self {
        Self {
            hive: HKEY_LOCAL_MACHINE,
            key: MACHINE_ENV_KEY.to_string(),
            broadcast: true,
        }
    }

    /// 当前用户下的自定义键（测试用，不广播）。
    pub fn current_user_key(key: impl Into<String>) -> Self {
        Self {
            hive: HKEY_CURRENT_USER,
            key: key.into(),
            broadcast: false,
        }
    }
}

impl EnvStore for RegistryEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        let key = RegKey::predef(self.hive)
            .open_subkey_with_flags(&self.key, KEY_READ)
            .map_err(|e| EnvError::Read {
                name: name.to_string(),
                reason: format!("打开注册表键失败 {}: {e}", self.key),
            })?;
        match key.get_raw_value(name) {
            Ok(raw) => Ok(Some(decode_utf16_reg(&raw.bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EnvError::Read {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// 写入环境变量。
    ///
    /// 异常处理：
    /// - 打开键或写入失败（常见原因：非管理员）返回 [`EnvError::Persist`]
    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError> {
        let persist_err = |reason: String| EnvError::Persist {
            name: name.to_string(),
            reason,
        };
        let key = RegKey::predef(self.hive)
            .open_subkey_with_flags(&self.key, KEY_READ | KEY_SET_VALUE)
            .map_err(|e| persist_err(format!("打开注册表键失败 {}: {e}", self.key)))?;

        let existing_expand = key
            .get_raw_value(name)
            .map(|raw| raw.vtype == REG_EXPAND_SZ)
            .unwrap_or(false);
        let vtype = if existing_expand || value.contains('%') {
            REG_EXPAND_SZ
        } else {
            REG_SZ
        };
        let raw = RegValue {
            bytes: encode_utf16_reg(value),
            vtype,
        };
        key.set_raw_value(name, &raw)
            .map_err(|e| persist_err(e.to_string()))?;

        if self.broadcast {
            broadcast_env_change();
        }
        Ok(())
    }
}

/// 通知其他进程环境变量已变化（尽力而为，失败只记日志）。
fn broadcast_env_change() {
    let env = to_wide("Environment");
    let mut result = 0usize;
    let ret = unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            WPARAM(0),
            LPARAM(env.as_ptr() as isize),
            SMTO_ABORTIFHUNG,
            5000,
            Some(&mut result as *mut usize),
        )
    };
    if ret.0 == 0 {
        warn!("广播 WM_SETTINGCHANGE 失败或超时");
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

/// 将注册表字符串字节（UTF-16LE，可能带 NUL 结尾）解码为 `String`。
fn decode_utf16_reg(bytes: &[u8]) -> String {
    let mut utf16: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    while utf16.last() == Some(&0) {
        utf16.pop();
    }
    String::from_utf16_lossy(&utf16)
}

/// 将字符串编码为注册表字符串字节（UTF-16LE + NUL 结尾）。
fn encode_utf16_reg(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}
