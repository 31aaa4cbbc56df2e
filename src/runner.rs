//! 并发编排模块
//!
//! 每个金丝雀一个独立任务的扇出/扇入执行模型：任务把完整的结果批次
//! 投递到共享队列，完成协调器等待全部任务结束后关闭队列，单一消费者
//! 流式打印结果并累计通过/失败计数。同一金丝雀内结果保持声明顺序，
//! 跨金丝雀的到达顺序不作保证。

use crate::checks::{self, CheckResult};
use crate::config::Canary;
use crate::context::{ConnectionResolver, ExecutionContext, RegistryTransport, SecretStore};
use crate::metrics::MetricsRegistry;
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// 结果批次队列容量
const QUEUE_DEPTH: usize = 1;

/// 一次完整运行的汇总
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// 通过的检查数
    pub passed: usize,
    /// 失败的检查数
    pub failed: usize,
    /// 按到达顺序累计的全部结果
    pub results: Vec<CheckResult>,
}

impl RunOutcome {
    /// 整体运行是否成功
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// 金丝雀运行器，持有所有任务共享的协作者
pub struct Runner {
    metrics: Arc<MetricsRegistry>,
    secrets: Option<Arc<dyn SecretStore>>,
    connections: Option<Arc<dyn ConnectionResolver>>,
    registry: Option<Arc<dyn RegistryTransport>>,
    trace: bool,
    quiet: bool,
}

impl Runner {
    /// 创建运行器，外部协作者使用各自的生产默认实现
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            metrics,
            secrets: None,
            connections: None,
            registry: None,
            trace: false,
            quiet: false,
        }
    }

    /// 替换密钥存储
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// 替换连接解析器
    pub fn with_connections(mut self, connections: Arc<dyn ConnectionResolver>) -> Self {
        self.connections = Some(connections);
        self
    }

    /// 替换镜像推送传输
    pub fn with_registry(mut self, registry: Arc<dyn RegistryTransport>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 设置诊断追踪
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// 关闭流式打印（测试用）
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn context(&self, canary: Canary) -> ExecutionContext {
        let mut ctx =
            ExecutionContext::new(canary, self.metrics.clone()).with_trace(self.trace);
        if let Some(secrets) = &self.secrets {
            ctx = ctx.with_secrets(secrets.clone());
        }
        if let Some(connections) = &self.connections {
            ctx = ctx.with_connections(connections.clone());
        }
        if let Some(registry) = &self.registry {
            ctx = ctx.with_registry(registry.clone());
        }
        ctx
    }

    /// 并发执行全部金丝雀并汇总结果
    ///
    /// 每个金丝雀一个任务，无工作池上限；结果不丢失也不重复：
    /// 队列在完成协调器确认所有生产者结束后才发出流结束信号。
    pub async fn run(&self, canaries: Vec<Canary>) -> RunOutcome {
        let (tx, mut rx) = mpsc::channel::<Vec<CheckResult>>(QUEUE_DEPTH);

        let mut handles = Vec::with_capacity(canaries.len());
        for canary in canaries {
            info!("执行金丝雀 {}/{}", canary.namespace, canary.name);
            let ctx = Arc::new(self.context(canary));
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let batch = checks::run_checks(&ctx).await;
                // 消费者提前退出时发送才会失败，此时结果已无人消费
                let _ = tx.send(batch).await;
            }));
        }
        drop(tx);

        // 完成协调器：等待所有任务结束；最后一个发送端随任务结束而
        // 释放，队列由此关闭
        let coordinator = tokio::spawn(async move {
            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    error!("金丝雀任务异常终止: {}", e);
                }
            }
        });

        let mut outcome = RunOutcome::default();
        while let Some(batch) = rx.recv().await {
            for result in batch {
                self.metrics.record(&result);
                if result.pass {
                    outcome.passed += 1;
                } else {
                    outcome.failed += 1;
                }
                if !self.quiet {
                    println!(
                        "{}\t{}",
                        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                        result
                    );
                }
                outcome.results.push(result);
            }
        }

        if let Err(e) = coordinator.await {
            error!("完成协调器异常终止: {}", e);
        }

        outcome
    }
}

/// 从配置文件名推导金丝雀名称：去掉扩展名并去除下划线
pub fn normalize_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', ""))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CanarySpec, DockerPushCheck, EnvVar, RegistryAuth};
    use crate::context::RegistryTransport;
    use crate::error::CheckError;
    use async_trait::async_trait;
    use std::path::PathBuf;

    /// 镜像名包含bad时返回错误行，否则返回成功行
    struct ScriptedTransport;

    #[async_trait]
    impl RegistryTransport for ScriptedTransport {
        async fn push_image(&self, image: &str, _auth: &str) -> Result<String, CheckError> {
            if image.contains("bad") {
                Ok("{\"error\":\"denied\"}\n".to_string())
            } else {
                Ok("{\"status\":\"Pushed\"}\n".to_string())
            }
        }
    }

    fn push_canary(name: &str, images: &[&str]) -> Canary {
        let checks = images
            .iter()
            .map(|image| DockerPushCheck {
                name: String::new(),
                image: (*image).to_string(),
                auth: RegistryAuth {
                    username: EnvVar::literal("username", "bob"),
                    password: EnvVar::literal("password", "hunter2"),
                },
            })
            .collect();
        Canary {
            name: name.to_string(),
            namespace: "default".to_string(),
            spec: CanarySpec {
                docker_push: checks,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name(&PathBuf::from("http_pass.yaml")), "httppass");
        assert_eq!(
            normalize_name(&PathBuf::from("fixtures/docker_push_fail.yml")),
            "dockerpushfail"
        );
        assert_eq!(normalize_name(&PathBuf::from("simple.yaml")), "simple");
    }

    #[tokio::test]
    async fn test_fan_out_loses_and_duplicates_nothing() {
        // K个金丝雀，每个N个检查：结果总数恰好等于K*N
        let k = 8;
        let n = 3;
        let canaries: Vec<Canary> = (0..k)
            .map(|i| push_canary(&format!("canary-{}", i), &["app:v1"; 3]))
            .collect();

        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let runner = Runner::new(metrics)
            .with_registry(Arc::new(ScriptedTransport))
            .with_quiet(true);
        let outcome = runner.run(canaries).await;

        assert_eq!(outcome.results.len(), k * n);
        assert_eq!(outcome.passed, k * n);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.success());

        // 每个金丝雀恰好贡献N个结果
        for i in 0..k {
            let name = format!("canary-{}", i);
            assert_eq!(
                outcome.results.iter().filter(|r| r.canary == name).count(),
                n
            );
        }
    }

    #[tokio::test]
    async fn test_failed_counts_and_outcome() {
        let canaries = vec![
            push_canary("good", &["app:v1", "app:v2"]),
            push_canary("mixed", &["app:v1", "bad:v1"]),
        ];

        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let runner = Runner::new(metrics)
            .with_registry(Arc::new(ScriptedTransport))
            .with_quiet(true);
        let outcome = runner.run(canaries).await;

        assert_eq!(outcome.passed, 3);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_one_failing_canary_does_not_abort_siblings() {
        let canaries = vec![
            push_canary("bad-one", &["bad:v1"]),
            push_canary("good-one", &["app:v1"]),
        ];

        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let runner = Runner::new(metrics)
            .with_registry(Arc::new(ScriptedTransport))
            .with_quiet(true);
        let outcome = runner.run(canaries).await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome
            .results
            .iter()
            .any(|r| r.canary == "good-one" && r.pass));
    }

    #[tokio::test]
    async fn test_order_within_canary_is_declaration_order() {
        let canaries = vec![push_canary("ordered", &["a:v1", "bad:v1", "c:v1"])];

        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let runner = Runner::new(metrics)
            .with_registry(Arc::new(ScriptedTransport))
            .with_quiet(true);
        let outcome = runner.run(canaries).await;

        let endpoints: Vec<_> = outcome
            .results
            .iter()
            .map(|r| r.endpoint.as_str())
            .collect();
        assert_eq!(endpoints, vec!["a:v1", "bad:v1", "c:v1"]);
    }
}
