//! 检查结果数据结构
//!
//! 定义所有检查器共用的结果与指标记录类型。结果由产生它的检查器
//! 一次性设定通过标志和失败消息，交给编排器后不再修改。

use crate::config::Canary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// 指标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// 单调累加计数器
    Counter,
    /// 后写覆盖的瞬时值
    Gauge,
}

/// 检查过程中附带产生的指标记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// 单次检查的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// 结果ID
    pub id: Uuid,
    /// 所属金丝雀名称
    pub canary: String,
    /// 所属命名空间
    pub namespace: String,
    /// 检查类型标识
    pub check_kind: String,
    /// 检查名称
    pub check_name: String,
    /// 检查目标
    pub endpoint: String,
    /// 产生时间
    pub timestamp: DateTime<Utc>,
    /// 是否通过
    pub pass: bool,
    /// 耗时（毫秒）
    pub duration_ms: u64,
    /// 失败消息
    pub message: Option<String>,
    /// 诊断数据（状态码、响应头、响应体等）
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
    /// 附带指标
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl CheckResult {
    /// 创建一个通过状态的结果，检查器在此基础上按需转为失败
    pub fn new(canary: &Canary, kind: &str, name: &str, endpoint: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            canary: canary.name.clone(),
            namespace: canary.namespace.clone(),
            check_kind: kind.to_string(),
            check_name: name.to_string(),
            endpoint: endpoint.to_string(),
            timestamp: Utc::now(),
            pass: true,
            duration_ms: 0,
            message: None,
            data: HashMap::new(),
            metrics: Vec::new(),
        }
    }

    /// 转为失败结果并设置失败消息
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.pass = false;
        self.message = Some(message.into());
        self
    }

    /// 设置耗时
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// 附加一条诊断数据
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// 附加一条指标记录
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.pass { "PASS" } else { "FAIL" };
        write!(
            f,
            "[{}] {}/{} {} {} duration={}ms",
            status, self.namespace, self.canary, self.check_kind, self.check_name, self.duration_ms
        )?;
        if let Some(message) = &self.message {
            write!(f, " {}", message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_canary() -> Canary {
        Canary {
            name: "demo".to_string(),
            namespace: "sandbox".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_result_defaults_to_pass() {
        let result = CheckResult::new(&test_canary(), "http", "frontdoor", "https://example.com");
        assert!(result.pass);
        assert!(result.message.is_none());
        assert!(result.metrics.is_empty());
        assert_eq!(result.check_kind, "http");
        assert_eq!(result.canary, "demo");
    }

    #[test]
    fn test_result_builder_pattern() {
        let result = CheckResult::new(&test_canary(), "http", "frontdoor", "https://example.com")
            .with_duration(Duration::from_millis(52))
            .with_data("code", serde_json::json!(200))
            .with_metric(Metric {
                name: "response_code".to_string(),
                kind: MetricKind::Counter,
                labels: BTreeMap::from([("code".to_string(), "200".to_string())]),
                value: 1.0,
            });

        assert_eq!(result.duration_ms, 52);
        assert_eq!(result.data["code"], serde_json::json!(200));
        assert_eq!(result.metrics.len(), 1);
        assert_eq!(result.metrics[0].kind, MetricKind::Counter);
    }

    #[test]
    fn test_result_fail_sets_message() {
        let result = CheckResult::new(&test_canary(), "http", "frontdoor", "https://example.com")
            .fail("response code invalid 500 != [200]");
        assert!(!result.pass);
        assert_eq!(
            result.message.as_deref(),
            Some("response code invalid 500 != [200]")
        );
    }

    #[test]
    fn test_result_display() {
        let pass = CheckResult::new(&test_canary(), "http", "frontdoor", "https://example.com")
            .with_duration(Duration::from_millis(52));
        assert_eq!(
            pass.to_string(),
            "[PASS] sandbox/demo http frontdoor duration=52ms"
        );

        let fail = CheckResult::new(&test_canary(), "dockerPush", "app", "app:v1").fail("boom");
        assert_eq!(
            fail.to_string(),
            "[FAIL] sandbox/demo dockerPush app duration=0ms boom"
        );
    }

    #[test]
    fn test_result_serialization_round_trip() {
        let result = CheckResult::new(&test_canary(), "http", "frontdoor", "https://example.com")
            .with_duration(Duration::from_millis(10))
            .fail("expected ok, found nope");
        let json = serde_json::to_string(&result).unwrap();
        let back: CheckResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, result.id);
        assert!(!back.pass);
        assert_eq!(back.message, result.message);
        assert_eq!(back.duration_ms, 10);
    }
}
