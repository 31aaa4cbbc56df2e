//! HTTP检查器实现
//!
//! 按配置构造HTTP请求、测量延迟，并按固定顺序执行响应校验：
//! 状态码允许列表、延迟阈值、内容子串、证书有效期。无论通过与否，
//! 诊断数据都会附加到结果上。

use crate::checks::result::{CheckResult, Metric, MetricKind};
use crate::checks::Checker;
use crate::config::{HttpCheck, JsonCheck};
use crate::context::{Connection, ExecutionContext};
use crate::error::CheckError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json_path::JsonPath;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;

/// 诊断追踪时捕获的响应体最大长度
const MAX_TRACE_BODY: usize = 512;

/// 失败消息中响应体预览的最大长度
const CONTENT_PREVIEW_LEN: usize = 100;

/// HTTP检查器
pub struct HttpChecker;

#[async_trait]
impl Checker for HttpChecker {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn run(&self, ctx: &ExecutionContext) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(ctx.canary.spec.http.len());
        for check in &ctx.canary.spec.http {
            results.push(self.check(ctx, check).await);
        }
        results
    }
}

impl HttpChecker {
    /// 执行单个HTTP检查，任何内部错误都转换为失败结果
    async fn check(&self, ctx: &ExecutionContext, check: &HttpCheck) -> CheckResult {
        let result = CheckResult::new(&ctx.canary, self.kind(), check.display_name(), check.target());

        if !check.endpoint.is_empty() && !check.url.is_empty() {
            return result.fail("cannot specify both endpoint and url");
        }

        let connection = match ctx.connection_for(check) {
            Ok(connection) => connection,
            Err(e) => return result.fail(format!("error getting connection: {}", e)),
        };

        if connection.url.is_empty() {
            return result.fail("no url or connection specified");
        }

        let digest = check.digest || connection.property_bool("digest");

        let url = match Url::parse(&connection.url) {
            Ok(url) => url,
            Err(e) => return result.fail(format!("failed to parse url: {}", e)),
        };

        let mut body = check.body.clone();
        if check.template_body {
            body = match ctx.template(&body) {
                Ok(body) => body,
                Err(e) => return result.fail(e.to_string()),
            };
        }

        let request = match self.build_request(ctx, check, &connection, url.clone(), &body, digest)
        {
            Ok(request) => request,
            Err(e) => return result.fail(e.to_string()),
        };

        ctx.trace(&format!("{} {}", check.method.to_uppercase(), url));
        if !body.is_empty() {
            ctx.trace(&format!("request body: {}", truncate(&body, MAX_TRACE_BODY)));
        }

        let started = Instant::now();
        let response = match self.dispatch(check, &connection, request, digest, &url).await {
            Ok(response) => response,
            Err(e) => return result.fail(e.to_string()),
        };
        let elapsed = started.elapsed();

        let status = response.status().as_u16();
        ctx.metrics().observe_response_status(status, check.target());

        let mut result = result.with_duration(elapsed).with_metric(Metric {
            name: "response_code".to_string(),
            kind: MetricKind::Counter,
            labels: BTreeMap::from([
                ("code".to_string(), status.to_string()),
                ("url".to_string(), check.target().to_string()),
            ]),
            value: 1.0,
        });

        let ssl_hours = ssl_hours_remaining(&response);
        if let Some(hours) = ssl_hours {
            ctx.metrics().observe_ssl_expiry(check.target(), hours / 24.0);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let headers = headers_as_json(&response);

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return result.fail(format!("failed to read response body: {}", e)),
        };
        ctx.trace(&format!(
            "response status={} body: {}",
            status,
            truncate(&text, MAX_TRACE_BODY)
        ));

        result = result
            .with_data("code", serde_json::json!(status))
            .with_data("headers", headers)
            .with_data("elapsed", serde_json::json!(elapsed.as_millis() as u64))
            .with_data("content", serde_json::Value::String(text.clone()))
            .with_data("sslAge", serde_json::json!(ssl_hours));

        if is_json {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) => {
                    result = result.with_data("json", json.clone());
                    if let Some(json_check) = &check.response_json_content {
                        if !json_check.path.is_empty() {
                            if let Err(message) = assert_json_path(&json, json_check) {
                                return result.fail(message);
                            }
                        }
                    }
                }
                Err(e) => {
                    if check.has_json_assertion() {
                        return result.fail(format!("invalid json response: {}", e));
                    }
                    ctx.trace(&format!("ignoring invalid json response: {}", e));
                }
            }
        }

        if !is_ok(status, &check.response_codes) {
            return result.fail(format!(
                "response code invalid {} != {:?}",
                status, check.response_codes
            ));
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        if check.threshold_millis > 0 && elapsed_ms > check.threshold_millis {
            return result.fail(format!(
                "threshold exceeded {}ms > {}ms",
                elapsed_ms, check.threshold_millis
            ));
        }

        if !check.response_content.is_empty() && !text.contains(&check.response_content) {
            return result.fail(format!(
                "expected {}, found {}",
                check.response_content,
                truncate(&text, CONTENT_PREVIEW_LEN)
            ));
        }

        if check.max_ssl_expiry > 0 {
            if let Err(message) = assert_ssl_validity(ssl_hours, check.max_ssl_expiry) {
                return result.fail(message);
            }
        }

        result
    }

    /// 构建HTTP请求
    fn build_request(
        &self,
        ctx: &ExecutionContext,
        check: &HttpCheck,
        connection: &Connection,
        url: Url,
        body: &str,
        digest: bool,
    ) -> Result<RequestBuilder, CheckError> {
        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .tls_info(true)
            .build()?;

        let method = Method::from_str(&check.method.to_uppercase())
            .map_err(|_| CheckError::InvalidMethod(check.method.clone()))?;

        let mut request = client.request(method, url);

        for header in &check.headers {
            let value = ctx
                .resolve_env_value(header)
                .map_err(|e| CheckError::Header {
                    name: header.name.clone(),
                    message: e.to_string(),
                })?;
            request = request.header(header.name.as_str(), value);
        }

        // 摘要认证的凭据在401质询后再附加
        if connection.has_credentials() && !digest {
            request = request.basic_auth(&connection.username, Some(&connection.password));
        }

        if check.threshold_millis > 0 {
            request = request.timeout(std::time::Duration::from_millis(check.threshold_millis));
        }

        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        Ok(request)
    }

    /// 发送请求；摘要认证时经一次401质询往返
    async fn dispatch(
        &self,
        check: &HttpCheck,
        connection: &Connection,
        request: RequestBuilder,
        digest: bool,
        url: &Url,
    ) -> Result<Response, CheckError> {
        if digest && connection.has_credentials() {
            let retry = request
                .try_clone()
                .ok_or_else(|| CheckError::Auth("request cannot be replayed".to_string()))?;

            let first = request.send().await?;
            if first.status() == StatusCode::UNAUTHORIZED {
                let challenge = first
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                if let Some(challenge) = challenge {
                    let answer = digest_answer(
                        &challenge,
                        &connection.username,
                        &connection.password,
                        &check.method,
                        url.path(),
                    )?;
                    return Ok(retry.header(AUTHORIZATION, answer).send().await?);
                }
            }
            return Ok(first);
        }

        Ok(request.send().await?)
    }
}

/// 状态码是否可接受；允许列表为空时按默认成功策略（2xx）判定
fn is_ok(status: u16, allowed: &[u16]) -> bool {
    if allowed.is_empty() {
        (200..300).contains(&status)
    } else {
        allowed.contains(&status)
    }
}

/// 按字符边界截断文本
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// 从响应的TLS扩展中计算证书剩余有效期（小时）
fn ssl_hours_remaining(response: &Response) -> Option<f64> {
    let info = response.extensions().get::<reqwest::tls::TlsInfo>()?;
    let der = info.peer_certificate()?;
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    Some(hours_until(
        cert.validity().not_after.timestamp(),
        Utc::now().timestamp(),
    ))
}

/// 到期时刻相对当前时刻的剩余小时数
fn hours_until(not_after: i64, now: i64) -> f64 {
    (not_after - now) as f64 / 3600.0
}

/// 校验证书剩余有效期；证书缺失与有效期不足是两种不同的失败
fn assert_ssl_validity(hours: Option<f64>, min_days: u32) -> Result<(), String> {
    let Some(hours) = hours else {
        return Err("no certificate found to check age".to_string());
    };
    let days = hours / 24.0;
    if days < f64::from(min_days) {
        return Err(format!(
            "certificate expires in {:.1} days, required at least {} days",
            days, min_days
        ));
    }
    Ok(())
}

/// 执行JSONPath断言，失败时返回失败消息
fn assert_json_path(json: &serde_json::Value, check: &JsonCheck) -> Result<(), String> {
    let path = JsonPath::parse(&check.path)
        .map_err(|e| format!("error parsing json path {}: {}", check.path, e))?;

    let node = path
        .query(json)
        .exactly_one()
        .map_err(|e| format!("error getting json path {}: {}", check.path, e))?;

    let found = match node {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return Err("json response could not be compared to a string".to_string()),
    };

    if found != check.value {
        return Err(format!("{} not equal to {}", found, check.value));
    }
    Ok(())
}

/// 响应头转为诊断数据
fn headers_as_json(response: &Response) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in response.headers() {
        map.insert(
            name.to_string(),
            serde_json::Value::String(String::from_utf8_lossy(value.as_bytes()).to_string()),
        );
    }
    serde_json::Value::Object(map)
}

/// 计算摘要认证的Authorization头
fn digest_answer(
    challenge: &str,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
) -> Result<String, CheckError> {
    let mut prompt = digest_auth::parse(challenge).map_err(|e| CheckError::Auth(e.to_string()))?;

    let mut context = digest_auth::AuthContext::new(username, password, uri);
    context.method = match method.to_uppercase().as_str() {
        "POST" => digest_auth::HttpMethod::POST,
        "HEAD" => digest_auth::HttpMethod::HEAD,
        _ => digest_auth::HttpMethod::GET,
    };

    let answer = prompt
        .respond(&context)
        .map_err(|e| CheckError::Auth(e.to_string()))?;
    Ok(answer.to_string())
}
