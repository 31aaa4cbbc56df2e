//! Prometheus指标模块
//!
//! 提供进程级指标注册表。注册表在进程启动时创建一次，通过共享句柄
//! 注入到每个检查器，运行期间被所有并发检查读写，不依赖环境全局量，
//! 测试之间互不污染计数。

use crate::checks::CheckResult;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};

/// 共享指标注册表
pub struct MetricsRegistry {
    registry: Registry,
    /// HTTP响应状态计数器
    response_status: CounterVec,
    /// 证书剩余有效期（天）
    ssl_expiration: GaugeVec,
    /// 检查执行计数器
    check_total: CounterVec,
}

impl MetricsRegistry {
    /// 创建并注册全部指标族
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let response_status = CounterVec::new(
            Opts::new(
                "canary_check_http_response_status",
                "The response status for HTTP checks per route.",
            ),
            &["status", "statusClass", "url"],
        )?;
        registry.register(Box::new(response_status.clone()))?;

        let ssl_expiration = GaugeVec::new(
            Opts::new(
                "canary_check_http_ssl_expiry",
                "The number of days until ssl expiration",
            ),
            &["url"],
        )?;
        registry.register(Box::new(ssl_expiration.clone()))?;

        let check_total = CounterVec::new(
            Opts::new(
                "canary_check_total",
                "The number of executed checks by kind and outcome.",
            ),
            &["kind", "status"],
        )?;
        registry.register(Box::new(check_total.clone()))?;

        Ok(Self {
            registry,
            response_status,
            ssl_expiration,
            check_total,
        })
    }

    /// 记录一次HTTP响应状态
    pub fn observe_response_status(&self, status: u16, url: &str) {
        self.response_status
            .with_label_values(&[&status.to_string(), status_code_to_class(status), url])
            .inc();
    }

    /// 记录目标证书的剩余有效期（天），同一目标后写覆盖先写
    pub fn observe_ssl_expiry(&self, url: &str, days: f64) {
        self.ssl_expiration.with_label_values(&[url]).set(days);
    }

    /// 记录一次检查的执行结果
    pub fn record(&self, result: &CheckResult) {
        let status = if result.pass { "pass" } else { "fail" };
        self.check_total
            .with_label_values(&[&result.check_kind, status])
            .inc();
    }

    /// 导出全部指标族
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

/// 状态码到状态类的纯映射
pub fn status_code_to_class(status_code: u16) -> &'static str {
    match status_code {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    }
}
