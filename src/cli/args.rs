//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Canary Vitals - 声明式金丝雀检查批量执行工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "canary-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "CANARY_VITALS_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub log_json: bool,

    /// 启用请求/响应诊断追踪
    #[arg(long, help = "启用请求/响应诊断追踪")]
    pub trace: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 执行检查并返回
    Run {
        /// 金丝雀配置文件路径，至少一个
        #[arg(required = true, value_name = "FILE")]
        config_files: Vec<PathBuf>,

        /// 覆盖所有金丝雀的命名空间
        #[arg(short = 'n', long, help = "覆盖所有金丝雀的命名空间")]
        namespace: Option<String>,

        /// 报告输出文件路径，未指定时输出到标准输出
        #[arg(short = 'o', long, help = "报告输出文件路径")]
        output_file: Option<PathBuf>,

        /// 输出JUnit格式报告
        #[arg(short = 'j', long, help = "输出JUnit格式报告")]
        junit: bool,

        /// 输出CSV格式报告
        #[arg(long, help = "输出CSV格式报告")]
        csv: bool,
    },
}

/// 日志级别枚举
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// 转换为tracing过滤器指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_parsing() {
        let args = Args::try_parse_from([
            "canary-vitals",
            "run",
            "canary.yaml",
            "extra.yaml",
            "-n",
            "sandbox",
            "-o",
            "report.xml",
            "--junit",
        ])
        .unwrap();

        let Commands::Run {
            config_files,
            namespace,
            output_file,
            junit,
            csv,
        } = args.command;
        assert_eq!(config_files.len(), 2);
        assert_eq!(namespace.as_deref(), Some("sandbox"));
        assert_eq!(output_file, Some(PathBuf::from("report.xml")));
        assert!(junit);
        assert!(!csv);
    }

    #[test]
    fn test_run_requires_config_file() {
        let result = Args::try_parse_from(["canary-vitals", "run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::Error.as_filter(), "error");
    }
}
