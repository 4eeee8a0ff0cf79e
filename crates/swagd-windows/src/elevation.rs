//! 提权/权限相关检测。
//!
//! 作者：SWAGD 安装项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::Result;
use windows::Win32::UI::Shell::IsUserAnAdmin;

/// 判断当前进程是否以管理员权限运行。
///
/// 返回值：
/// - `Ok(true)`：当前为管理员，可以写入机器级环境变量
/// - `Ok(false)`：当前非管理员，写入 HKLM 会失败
///
/// 异常处理：
/// - 该 Win32 API 本身不返回错误码；保留 `Result` 与其他平台检测接口一致
pub fn is_running_as_admin() -> Result<bool> {
    unsafe { Ok(IsUserAnAdmin().as_bool()) }
}
