use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志
///
/// `RUST_LOG` 优先；否则按 `-v` 次数选择级别。
pub fn init(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
