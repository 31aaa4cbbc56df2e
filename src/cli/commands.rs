//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands};
use crate::config::{ConfigLoader, YamlConfigLoader};
use crate::error::Result;
use crate::metrics::MetricsRegistry;
use crate::output::{CsvFormatter, JunitFormatter, ReportFormatter};
use crate::runner::{normalize_name, Runner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令并返回进程退出码
    async fn execute(&self, args: &Args) -> Result<i32>;
}

/// 检查批量执行命令
pub struct RunCommand;

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, args: &Args) -> Result<i32> {
        let Commands::Run {
            config_files,
            namespace,
            output_file,
            junit,
            csv,
        } = &args.command;

        let started = Instant::now();

        // 任何配置文件不可解析都在启动并发任务之前终止整次运行
        let canaries = load_canaries(config_files, namespace.as_deref()).await?;

        let metrics = Arc::new(MetricsRegistry::new()?);
        let runner = Runner::new(metrics).with_trace(args.trace);
        let outcome = runner.run(canaries).await;

        if *junit {
            let report = JunitFormatter::new().format(&outcome.results);
            self.emit_report(&report, output_file.as_deref()).await?;
        }
        if *csv {
            let report = CsvFormatter::new().format(&outcome.results);
            self.emit_report(&report, output_file.as_deref()).await?;
        }

        info!(
            "{} passed, {} failed in {:?}",
            outcome.passed,
            outcome.failed,
            started.elapsed()
        );

        Ok(if outcome.success() { 0 } else { 1 })
    }
}

impl RunCommand {
    /// 输出报告到文件或标准输出
    async fn emit_report(&self, report: &str, output_file: Option<&Path>) -> Result<()> {
        match output_file {
            Some(path) => {
                tokio::fs::write(path, report).await?;
                info!("报告已写入 {}", path.display());
            }
            None => println!("{}", report),
        }
        Ok(())
    }
}

/// 根据解析的参数选择命令处理器
pub fn dispatch(args: &Args) -> Box<dyn Command> {
    match &args.command {
        Commands::Run { .. } => Box::new(RunCommand),
    }
}

/// 装载全部配置文件并归一化金丝雀身份
///
/// 未命名的金丝雀从文件名推导名称；命名空间覆盖应用于所有金丝雀。
pub async fn load_canaries(
    config_files: &[PathBuf],
    namespace: Option<&str>,
) -> Result<Vec<crate::config::Canary>> {
    let loader = YamlConfigLoader::new(true);
    let mut canaries = Vec::new();
    for file in config_files {
        info!("加载配置文件 {}", file.display());
        for mut canary in loader.load_from_file(file).await? {
            if let Some(namespace) = namespace {
                canary.namespace = namespace.to_string();
            }
            if canary.name.is_empty() {
                canary.name = normalize_name(file);
            }
            canaries.push(canary);
        }
    }
    Ok(canaries)
}
