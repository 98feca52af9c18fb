//! stderr 日志：`[<rfc3339 毫秒>][pid=<pid>][<tag>] msg`
//!
//! debug 级别默认关闭；`LOG_LEVEL=debug` 或设置了 `LOG_DEBUG` 时输出。

use humantime::format_rfc3339_millis;
use std::sync::OnceLock;
use std::time::SystemTime;

fn emit(tag: &str, level: Option<&str>, msg: &str) {
    let ts = format_rfc3339_millis(SystemTime::now());
    let pid = std::process::id();
    match level {
        Some(lvl) => eprintln!("[{ts}][pid={pid}][{tag}] {lvl}: {msg}"),
        None => eprintln!("[{ts}][pid={pid}][{tag}] {msg}"),
    }
}

fn debug_from_env(log_level: Option<&str>, log_debug_set: bool) -> bool {
    let lvl = log_level.unwrap_or("info");
    lvl.trim().eq_ignore_ascii_case("debug") || log_debug_set
}

/// 进程内只读一次环境变量
pub fn debug_enabled() -> bool {
    static DEBUG: OnceLock<bool> = OnceLock::new();
    *DEBUG.get_or_init(|| {
        let lvl = std::env::var("LOG_LEVEL").ok();
        debug_from_env(lvl.as_deref(), std::env::var_os("LOG_DEBUG").is_some())
    })
}

pub fn log_info(tag: &str, msg: impl AsRef<str>) {
    emit(tag, None, msg.as_ref());
}

pub fn log_warn(tag: &str, msg: impl AsRef<str>) {
    emit(tag, Some("WARN"), msg.as_ref());
}

pub fn log_debug(tag: &str, msg: impl AsRef<str>) {
    if debug_enabled() {
        emit(tag, Some("DEBUG"), msg.as_ref());
    }
}

/// 带 rayon 线程编号的 tag，例如 `worker#3`；不在 rayon 池内时为 `worker#-`
pub fn worker_tag() -> String {
    match rayon::current_thread_index() {
        Some(i) => format!("worker#{i}"),
        None => "worker#-".to_string(),
    }
}
