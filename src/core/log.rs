//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//!
//! 日志配置在进程启动时确定一次：`init_logger` 根据 `LoggingConfig`
//! 安装全局 subscriber，之后各组件直接使用 `tracing` 的宏，
//! 图形相关的日志统一使用 [`GFX_TARGET`] 作为 target。
//!
//! # 使用示例
//!
//! ```no_run
//! use tritonx::core::{log, Config};
//!
//! let config = Config::default();
//! let _guard = log::init_logger(&config.logging).expect("logger");
//! tracing::info!(width = 1280, height = 720, "Window created");
//! ```

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::config::{LogLevel, LoggingConfig};
use super::error::{Result, TritonError};

/// 图形上下文使用的日志 target
pub const GFX_TARGET: &str = "tritonx::gfx";

/// 日志系统的生命周期守卫
///
/// 持有文件输出的后台写线程，drop 时会刷新尚未写出的日志。
/// 必须保存到 `main` 结束。
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LogLevel {
    /// 对应的 `EnvFilter` 指令
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 初始化日志系统
///
/// 必须在程序开始时调用一次。`RUST_LOG` 环境变量存在时优先于配置中的级别。
///
/// # 参数
///
/// * `config` - 日志配置
///
/// # 返回值
///
/// 返回需要一直持有的 [`LogGuard`]
pub fn init_logger(config: &LoggingConfig) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(true);

    if config.file_output {
        let path = Path::new(&config.log_file);
        let directory = path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let filename = path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("tritonx.log");

        // 每天滚动的文件输出，经由后台线程写入
        let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, filename);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)  // 文件不需要 ANSI 颜色
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| TritonError::Log(e.to_string()))?;

        Ok(LogGuard { _file_guard: Some(guard) })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .try_init()
            .map_err(|e| TritonError::Log(e.to_string()))?;

        Ok(LogGuard { _file_guard: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_directive() {
        assert_eq!(LogLevel::Trace.as_directive(), "trace");
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
    }
}
