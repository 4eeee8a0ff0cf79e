//! Windows 平台适配（注册表清单、机器级环境变量、消息框、启动安装）。
//!
//! 目标：
//! - 为 `swagd-core` 中的协作者接口提供 Windows 实现，上层业务代码不直接依赖 Win32 细节
//! - 非 Windows 平台提供可编译的降级实现（见 [`platform`]），便于在 CI 上跑端到端测试
//!
//! 安全注意：
//! - 写入机器级环境变量需要管理员权限
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

#[cfg(windows)]
pub mod dialog;
#[cfg(windows)]
pub mod elevation;
pub mod launcher;
pub mod platform;
#[cfg(windows)]
pub mod registry;
