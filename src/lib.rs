//! Canary Vitals - 声明式金丝雀检查批量执行工具
//!
//! 这是一个用Rust编写的金丝雀检查批量执行工具，支持：
//! - HTTP/HTTPS探测（状态码、延迟阈值、内容断言、JSONPath断言、证书有效期）
//! - 容器镜像推送检查
//! - 每个配置单元一个并发任务的扇出/扇入执行模型
//! - Prometheus指标记录
//! - JUnit/CSV报告输出
//! - 结构化日志记录

pub mod checks;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod runner;

// 重新导出主要类型
pub use checks::{CheckResult, Checker, Metric, MetricKind};
pub use config::{Canary, CanarySpec, DockerPushCheck, HttpCheck};
pub use context::ExecutionContext;
pub use error::CanaryError;

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
