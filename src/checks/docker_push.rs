//! 镜像推送检查器实现
//!
//! 解析仓库凭据、编码推送认证载荷，并解码推送传输返回的按行
//! 状态事件流：首个携带错误的事件即判失败。

use crate::checks::result::CheckResult;
use crate::checks::Checker;
use crate::config::DockerPushCheck;
use crate::context::ExecutionContext;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Instant;

/// 推送状态流中的单条事件
#[derive(Debug, Deserialize)]
struct PushStatusLine {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: String,
}

/// 镜像推送检查器
pub struct DockerPushChecker;

#[async_trait]
impl Checker for DockerPushChecker {
    fn kind(&self) -> &'static str {
        "dockerPush"
    }

    async fn run(&self, ctx: &ExecutionContext) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(ctx.canary.spec.docker_push.len());
        for check in &ctx.canary.spec.docker_push {
            results.push(self.check(ctx, check).await);
        }
        results
    }
}

impl DockerPushChecker {
    /// 执行单个镜像推送检查
    async fn check(&self, ctx: &ExecutionContext, check: &DockerPushCheck) -> CheckResult {
        let result =
            CheckResult::new(&ctx.canary, self.kind(), check.display_name(), &check.image);

        let username = match ctx.resolve_env_value(&check.auth.username) {
            Ok(value) => value,
            Err(e) => return result.fail(format!("failed to fetch auth details: {}", e)),
        };
        let password = match ctx.resolve_env_value(&check.auth.password) {
            Ok(value) => value,
            Err(e) => return result.fail(format!("failed to fetch auth details: {}", e)),
        };

        let registry_auth = encode_registry_auth(&username, &password);

        let started = Instant::now();
        let stream = match ctx.registry().push_image(&check.image, &registry_auth).await {
            Ok(stream) => stream,
            Err(e) => {
                return result
                    .with_duration(started.elapsed())
                    .fail(format!("failed to push image: {}", e))
            }
        };
        let result = result.with_duration(started.elapsed());

        for line in stream.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let decoded: PushStatusLine = match serde_json::from_str(line) {
                Ok(decoded) => decoded,
                Err(e) => return result.fail(format!("invalid response: {}: {}", e, line)),
            };
            if !decoded.error.is_empty() {
                return result.fail(format!("failed to push {}", decoded.error));
            }
            ctx.trace(&format!("push status: {}", decoded.status));
        }

        result
    }
}

/// 编码镜像仓库认证载荷（JSON后做URL安全base64）
pub fn encode_registry_auth(username: &str, password: &str) -> String {
    let payload = serde_json::json!({
        "username": username,
        "password": password,
    });
    URL_SAFE.encode(payload.to_string())
}
