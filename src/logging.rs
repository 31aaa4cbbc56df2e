//! 日志系统模块
//!
//! 提供结构化日志配置和初始化功能

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别（trace/debug/info/warn/error）
    pub level: String,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            json_format: false,
        }
    }
}

/// 日志系统
pub struct LoggingSystem;

impl LoggingSystem {
    /// 初始化全局日志系统
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `anyhow::Result<()>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<()> {
        // RUST_LOG优先于配置中的级别
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

        // 将log宏桥接到tracing（重复初始化时忽略错误，便于测试）
        let _ = tracing_log::LogTracer::init();

        if !config.console {
            return Ok(());
        }

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.json_format {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer().with_target(false)).try_init()
        };

        result.map_err(|e| anyhow::anyhow!("初始化日志系统失败: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console);
        assert!(!config.json_format);
    }
}
