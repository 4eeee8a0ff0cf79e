//! 按平台选择默认协作者。
//!
//! - Windows：注册表清单 + 机器级注册表环境变量
//! - 其他平台：清单不可用；环境变量只读（读取进程环境变量，写入返回持久化失败）
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::Result;
use swagd_core::env::{EnvError, EnvStore};
use swagd_core::inventory::InventorySource;

/// 默认的已安装软件数据源。
#[cfg(windows)]
pub fn default_inventory_source() -> Box<dyn InventorySource> {
    Box::new(crate::registry::RegistryInventorySource::new())
}

/// 默认的已安装软件数据源。
#[cfg(not(windows))]
pub fn default_inventory_source() -> Box<dyn InventorySource> {
    Box::new(swagd_core::inventory::UnavailableSource {
        reason: "当前平台没有 Windows 注册表".to_string(),
    })
}

/// 默认的机器级环境变量存储。
#[cfg(windows)]
pub fn default_env_store() -> Box<dyn EnvStore> {
    Box::new(crate::registry::RegistryEnvStore::machine())
}

/// 默认的机器级环境变量存储。
#[cfg(not(windows))]
pub fn default_env_store() -> Box<dyn EnvStore> {
    Box::new(ProcessEnvStore)
}

/// 当前进程是否具备管理员权限。
///
/// 异常处理：
/// - 非 Windows 平台恒为 `Ok(false)`
pub fn is_admin() -> Result<bool> {
    #[cfg(windows)]
    {
        crate::elevation::is_running_as_admin()
    }
    #[cfg(not(windows))]
    {
        Ok(false)
    }
}

/// 读取进程环境变量、拒绝写入的存储（非 Windows 平台）。
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvStore;

impl EnvStore for ProcessEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        Ok(std::env::var(name).ok())
    }

    fn set(&mut self, name: &str, _value: &str) -> Result<(), EnvError> {
        Err(EnvError::Persist {
            name: name.to_string(),
            reason: "当前平台不支持写入机器级环境变量".to_string(),
        })
    }
}
