//! 日志初始化
//!
//! 优先使用 `RUST_LOG`，否则按 `VERBOSE_LOGGING` 选择 info / debug。

use tracing_subscriber::EnvFilter;

/// 初始化全局 tracing subscriber（重复调用无副作用）
pub fn init() {
    let verbose = std::env::var("VERBOSE_LOGGING")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    let default_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("thesis_eval={},warn", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
