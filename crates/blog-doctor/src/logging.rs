//! 日志初始化
//!
//! 基于 `tracing-subscriber`，支持 `RUST_LOG` 覆盖与 JSON 输出

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// 日志选项
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// 默认级别（`RUST_LOG` 未设置时使用）
    pub level: String,
    /// 输出 JSON 行
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// 构建过滤器：`RUST_LOG` 优先，否则使用 `options.level`
pub fn build_filter(options: &LogOptions) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化全局日志
///
/// 重复初始化会返回错误而不是 panic。
pub fn init_logging(options: &LogOptions) -> anyhow::Result<()> {
    let filter = build_filter(options);

    if options.json {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}
