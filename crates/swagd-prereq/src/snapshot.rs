//! 快照文件（JSON）读写，用于演练与端到端测试。
//!
//! - `--inventory-snapshot`：按范围列出已安装软件，代替注册表
//! - `--env-snapshot`：环境变量对象，代替机器级注册表；每次写入立即落盘
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use swagd_core::env::{EnvError, EnvStore, MemoryEnvStore};
use swagd_core::inventory::SnapshotSource;

/// 读取已安装软件快照。
///
/// 异常处理：
/// - 文件不存在或 JSON 无效返回错误
pub fn load_inventory_snapshot(path: &Path) -> Result<SnapshotSource> {
    let bytes =
        std::fs::read(path).with_context(|| format!("读取清单快照失败: {}", path.display()))?;
    serde_json::from_slice(&bytes).context("解析清单快照 JSON 失败")
}

/// 以 JSON 文件持久化的环境变量存储。
#[derive(Debug)]
pub struct FileEnvStore {
    path: PathBuf,
    inner: MemoryEnvStore,
}

impl FileEnvStore {
    /// 打开快照文件；文件不存在时视为空集合。
    ///
    /// 异常处理：
    /// - 文件存在但无法读取或 JSON 无效时返回错误
    pub fn open(path: &Path) -> Result<Self> {
        let inner = if path.exists() {
            let bytes = std::fs::read(path)
                .with_context(|| format!("读取环境变量快照失败: {}", path.display()))?;
            serde_json::from_slice(&bytes).context("解析环境变量快照 JSON 失败")?
        } else {
            MemoryEnvStore::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.inner)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("写入环境变量快照失败: {}", self.path.display()))
    }
}

impl EnvStore for FileEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvError> {
        self.inner.get(name)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvError> {
        self.inner.set(name, value)?;
        self.flush().map_err(|e| EnvError::Persist {
            name: name.to_string(),
            reason: format!("{e:#}"),
        })
    }
}
