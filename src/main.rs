//! Canary Vitals 主程序入口
//!
//! 声明式金丝雀检查批量执行工具

use anyhow::Context;
use canary_vitals::cli::{args::Args, commands};
use canary_vitals::logging::{LogConfig, LoggingSystem};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.as_filter().to_string(),
        console: true,
        json_format: args.log_json,
    };
    LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    // 分发并执行命令；任何检查失败时以非零退出码结束进程
    let command = commands::dispatch(&args);
    let exit_code = command.execute(&args).await?;
    std::process::exit(exit_code);
}
