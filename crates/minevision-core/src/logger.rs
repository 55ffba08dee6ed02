//! 统一日志系统
//!
//! 控制台 + 滚动文件双输出；叶子 crate 中的 log 宏记录
//! 通过 tracing-subscriber 的 log 桥一并收集。

use std::fs;
use std::sync::Once;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt::time::LocalTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::error::Result;

static LOGGER_INIT: Once = Once::new();

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 文件滚动策略
#[derive(Debug, Clone)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 日志目录
    pub log_dir: String,
    /// 是否输出到控制台
    pub console_output: bool,
    /// 是否输出到文件
    pub file_output: bool,
    /// 文件滚动策略
    pub rotation: LogRotation,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_dir: "logs".to_string(),
            console_output: true,
            file_output: true,
            rotation: LogRotation::Daily,
        }
    }
}

/// 初始化全局日志系统（进程内只生效一次）
pub fn init_logging(config: &LoggerConfig) -> Result<()> {
    let mut result = Ok(());
    LOGGER_INIT.call_once(|| {
        result = setup_logging(config);
    });
    result
}

fn setup_logging(config: &LoggerConfig) -> Result<()> {
    if config.file_output {
        fs::create_dir_all(&config.log_dir)?;
    }

    let level_str = config.level.as_str();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "minevision={lvl},minevision_core={lvl},minevision_server={lvl},rtsp_camera={lvl},video_enhance={lvl}",
            lvl = level_str
        ))
    });

    let registry = Registry::default().with(env_filter);

    let console_layer = if config.console_output {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_timer(LocalTime::rfc_3339()),
        )
    } else {
        None
    };

    let file_layer = if config.file_output {
        let file_appender = match config.rotation {
            LogRotation::Daily => rolling::daily(&config.log_dir, "minevision.log"),
            LogRotation::Hourly => rolling::hourly(&config.log_dir, "minevision.log"),
            LogRotation::Never => rolling::never(&config.log_dir, "minevision.log"),
        };
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339()),
        )
    } else {
        None
    };

    registry.with(console_layer).with(file_layer).init();

    info!("日志系统初始化完成");
    info!("日志级别: {:?}", config.level);
    if config.file_output {
        info!("日志目录: {}", config.log_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logger_initialization_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let config = LoggerConfig {
            log_dir: temp_dir.path().to_string_lossy().to_string(),
            ..Default::default()
        };

        assert!(init_logging(&config).is_ok());
        // 再次初始化不报错也不生效
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_level_strings() {
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }
}
