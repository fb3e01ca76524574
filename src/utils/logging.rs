//! 日志工具模块
//!
//! 提供 tracing 订阅器初始化和文本截断辅助函数

use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 默认 info 级别，`--verbose` 提升到 debug；
/// `RUST_LOG` 环境变量优先级最高
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
