//! SWAGD 前置依赖解析核心库（跨平台/不含 Win32 调用）。
//!
//! 功能：
//! - 定义前置依赖清单（prereq-manifest.json）与校验
//! - 版本比较（点分数字逐分量比较 / 注册表打包整数比较）
//! - 已安装软件清单读取与规范化、依赖匹配、依赖解析（第一个未满足即阻塞）
//! - 环境变量幂等配置（仅缺失时写入、PATH 段去重追加）
//! - 串联以上步骤的处理流程，外部协作者（数据源、提示、启动器、环境变量存储）均通过 trait 注入
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

pub mod env;
pub mod flow;
pub mod inventory;
pub mod manifest;
pub mod matcher;
pub mod paths;
pub mod resolve;
pub mod version;
