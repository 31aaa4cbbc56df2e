//! 夹具驱动的集成测试
//!
//! 从tests/fixtures目录加载金丝雀配置并断言检查结果：文件名包含
//! "fail"的夹具必须产生失败结果，包含"mix"的只记录日志不做断言，
//! 其余夹具必须全部通过。

use async_trait::async_trait;
use canary_vitals::checks::run_checks;
use canary_vitals::config::{Canary, ConfigLoader, YamlConfigLoader};
use canary_vitals::context::{
    ExecutionContext, RegistryTransport, SecretStore, StaticSecretStore,
};
use canary_vitals::error::CheckError;
use canary_vitals::metrics::MetricsRegistry;
use canary_vitals::runner::{normalize_name, Runner};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// 镜像名包含bad时返回首个错误事件，否则返回成功事件流
struct ScriptedTransport;

#[async_trait]
impl RegistryTransport for ScriptedTransport {
    async fn push_image(&self, image: &str, _auth: &str) -> Result<String, CheckError> {
        if image.contains("bad") {
            Ok("{\"status\":\"Preparing\"}\n{\"error\":\"denied: access forbidden\"}\n".to_string())
        } else {
            Ok("{\"status\":\"Preparing\"}\n{\"status\":\"Pushed\"}\n".to_string())
        }
    }
}

fn fixture_secrets() -> Arc<dyn SecretStore> {
    Arc::new(StaticSecretStore::new(HashMap::from([(
        "REGISTRY_PASSWORD".to_string(),
        "hunter2".to_string(),
    )])))
}

/// 启动被测目标使用的mock服务器，mock句柄随服务器一同存活
async fn fixture_server() -> (mockito::ServerGuard, Vec<mockito::Mock>) {
    let mut server = mockito::Server::new_async().await;
    let mocks = vec![
        server
            .mock("GET", "/status/200")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await,
        server
            .mock("GET", "/status/500")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await,
        server
            .mock("GET", "/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"healthy"}"#)
            .create_async()
            .await,
        server
            .mock("GET", "/content")
            .with_status(200)
            .with_body("all systems nominal")
            .create_async()
            .await,
    ];
    (server, mocks)
}

/// 渲染夹具内容并加载为金丝雀列表
async fn load_fixture(name: &str, server_url: &str) -> Vec<Canary> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let raw = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("读取夹具 {} 失败: {}", name, e));

    let rendered = handlebars::Handlebars::new()
        .render_template(&raw, &serde_json::json!({ "server": server_url }))
        .unwrap_or_else(|e| panic!("渲染夹具 {} 失败: {}", name, e));

    let loader = YamlConfigLoader::new(false);
    let mut canaries = loader
        .load_from_string(&rendered)
        .await
        .unwrap_or_else(|e| panic!("加载夹具 {} 失败: {}", name, e));

    for canary in &mut canaries {
        if canary.name.is_empty() {
            canary.name = normalize_name(Path::new(name));
        }
    }
    canaries
}

fn fixture_names() -> Vec<String> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("读取夹具目录失败")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".yaml") && !name.starts_with('_'))
        .collect();
    names.sort();
    names
}

fn context_for(canary: Canary) -> ExecutionContext {
    ExecutionContext::new(canary, Arc::new(MetricsRegistry::new().unwrap()))
        .with_secrets(fixture_secrets())
        .with_registry(Arc::new(ScriptedTransport))
}

#[tokio::test]
async fn test_fixtures() {
    let (server, _mocks) = fixture_server().await;
    let names = fixture_names();
    assert!(!names.is_empty(), "夹具目录为空");

    for name in names {
        for canary in load_fixture(&name, &server.url()).await {
            let expected = canary.spec.http.len() + canary.spec.docker_push.len();
            let results = run_checks(&context_for(canary)).await;
            assert_eq!(results.len(), expected, "{}: 结果数量不符", name);

            for result in results {
                if name.contains("mix") {
                    println!("{}: {}", name, result);
                } else if name.contains("fail") {
                    assert!(
                        !result.pass,
                        "{}: 期望失败的检查却通过了: {}",
                        name, result
                    );
                } else {
                    assert!(result.pass, "{}: 期望通过的检查却失败了: {}", name, result);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_runner_drains_every_fixture_result() {
    let (server, _mocks) = fixture_server().await;

    let mut canaries = Vec::new();
    let mut expected = 0;
    for name in fixture_names() {
        for canary in load_fixture(&name, &server.url()).await {
            expected += canary.spec.http.len() + canary.spec.docker_push.len();
            canaries.push(canary);
        }
    }

    let runner = Runner::new(Arc::new(MetricsRegistry::new().unwrap()))
        .with_secrets(fixture_secrets())
        .with_registry(Arc::new(ScriptedTransport))
        .with_quiet(true);
    let outcome = runner.run(canaries).await;

    // 扇出/扇入不丢失、不重复结果
    assert_eq!(outcome.results.len(), expected);
    assert_eq!(outcome.passed + outcome.failed, expected);
    // http_fail有2个失败，http_mix有1个，docker_push_fail有1个
    assert_eq!(outcome.failed, 4);
    assert!(!outcome.success());
}
