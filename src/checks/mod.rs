//! 检查器模块
//!
//! 定义所有检查类型实现的统一契约，并提供跨检查器的分发入口。
//! 新的检查类型通过实现[`Checker`]加入已注册集合，而不是修改
//! 既有检查器。

pub mod docker_push;
pub mod http;
pub mod result;

pub use docker_push::DockerPushChecker;
pub use http::HttpChecker;
pub use result::{CheckResult, Metric, MetricKind};

use crate::context::ExecutionContext;
use async_trait::async_trait;

/// 检查器契约
///
/// `run`遍历金丝雀定义中本类型的检查列表，按声明顺序为每一项产生
/// 恰好一个结果；任何内部错误都转换为失败结果，绝不越过检查器边界
/// 向上抛出。
#[async_trait]
pub trait Checker: Send + Sync {
    /// 检查类型标识
    fn kind(&self) -> &'static str;

    /// 执行本类型的全部检查
    async fn run(&self, ctx: &ExecutionContext) -> Vec<CheckResult>;
}

/// 已注册的检查器集合
pub fn all_checkers() -> Vec<Box<dyn Checker>> {
    vec![Box::new(HttpChecker), Box::new(DockerPushChecker)]
}

/// 对一个金丝雀执行所有已注册检查器并拼接结果
pub async fn run_checks(ctx: &ExecutionContext) -> Vec<CheckResult> {
    let mut results = Vec::new();
    for checker in all_checkers() {
        results.extend(checker.run(ctx).await);
    }
    results
}
