//! 执行上下文模块
//!
//! 为并发执行中的检查器提供密钥解析、连接解析、镜像推送传输和
//! 请求体模板等外部协作者的访问入口。上下文在一次运行中以只读为主，
//! 内部的密钥缓存允许并发读取。

use crate::config::{Canary, EnvVar, HttpCheck};
use crate::error::CheckError;
use crate::metrics::MetricsRegistry;
use async_trait::async_trait;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// 已解析的网络目标与凭据
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// 任意字符串键值属性，如 digest: "true"
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Connection {
    /// 是否携带凭据
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    /// 读取布尔属性
    pub fn property_bool(&self, key: &str) -> bool {
        self.properties.get(key).map(|v| v == "true").unwrap_or(false)
    }
}

/// 密钥存储，解析`valueFrom`引用
pub trait SecretStore: Send + Sync {
    fn resolve(&self, key: &str) -> Result<String, CheckError>;
}

/// 从进程环境变量解析密钥的存储实现
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn resolve(&self, key: &str) -> Result<String, CheckError> {
        std::env::var(key).map_err(|_| CheckError::UnresolvedSecret(key.to_string()))
    }
}

/// 静态密钥存储，用于程序化嵌入与测试
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    values: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl SecretStore for StaticSecretStore {
    fn resolve(&self, key: &str) -> Result<String, CheckError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| CheckError::UnresolvedSecret(key.to_string()))
    }
}

/// 具名连接解析器
pub trait ConnectionResolver: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Connection>;
}

/// 基于静态映射的连接解析器
#[derive(Debug, Default)]
pub struct StaticConnectionResolver {
    connections: HashMap<String, Connection>,
}

impl StaticConnectionResolver {
    pub fn new(connections: HashMap<String, Connection>) -> Self {
        Self { connections }
    }
}

impl ConnectionResolver for StaticConnectionResolver {
    fn lookup(&self, name: &str) -> Option<Connection> {
        self.connections.get(name).cloned()
    }
}

/// 镜像推送传输
///
/// 推送协议本身属于外部协作者，这里只约定它的表面：发起推送并返回
/// 原始的按换行分隔的状态事件流。
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// 推送镜像，返回推送操作的状态事件流原文
    async fn push_image(&self, image: &str, registry_auth: &str) -> Result<String, CheckError>;
}

/// 通过Docker Engine HTTP API推送镜像的传输实现
pub struct DockerEngineTransport {
    client: reqwest::Client,
    engine_url: String,
}

impl DockerEngineTransport {
    /// 指定Engine地址创建传输
    pub fn new(engine_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            engine_url: normalize_engine_url(engine_url.into()),
        }
    }

    /// 从DOCKER_HOST环境变量创建传输，未设置时使用本机默认端口
    pub fn from_env() -> Self {
        let host =
            std::env::var("DOCKER_HOST").unwrap_or_else(|_| "tcp://127.0.0.1:2375".to_string());
        Self::new(host)
    }
}

fn normalize_engine_url(host: String) -> String {
    let host = host.trim_end_matches('/').to_string();
    if let Some(rest) = host.strip_prefix("tcp://") {
        format!("http://{}", rest)
    } else {
        host
    }
}

/// 拆分镜像引用中的名称和标签
fn split_image_tag(image: &str) -> (&str, &str) {
    let slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[slash..].rfind(':') {
        Some(i) => (&image[..slash + i], &image[slash + i + 1..]),
        None => (image, "latest"),
    }
}

#[async_trait]
impl RegistryTransport for DockerEngineTransport {
    async fn push_image(&self, image: &str, registry_auth: &str) -> Result<String, CheckError> {
        let (name, tag) = split_image_tag(image);
        let url = format!("{}/images/{}/push?tag={}", self.engine_url, name, tag);

        let response = self
            .client
            .post(&url)
            .header("X-Registry-Auth", registry_auth)
            .send()
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(CheckError::Transport(format!(
                "push returned status {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(body)
    }
}

/// 一次运行中单个金丝雀的执行上下文
///
/// 被该金丝雀的所有检查共享；共享部分（指标、密钥、连接、传输）
/// 以Arc在所有金丝雀任务间复用。
pub struct ExecutionContext {
    /// 当前金丝雀
    pub canary: Canary,
    metrics: Arc<MetricsRegistry>,
    secrets: Arc<dyn SecretStore>,
    connections: Arc<dyn ConnectionResolver>,
    registry: Arc<dyn RegistryTransport>,
    trace: bool,
    templates: Handlebars<'static>,
    env_cache: RwLock<HashMap<String, String>>,
}

impl ExecutionContext {
    /// 创建执行上下文，使用生产环境的默认协作者
    pub fn new(canary: Canary, metrics: Arc<MetricsRegistry>) -> Self {
        let connections = canary.connections.clone();
        Self {
            canary,
            metrics,
            secrets: Arc::new(EnvSecretStore),
            connections: Arc::new(StaticConnectionResolver::new(connections)),
            registry: Arc::new(DockerEngineTransport::from_env()),
            trace: false,
            templates: Handlebars::new(),
            env_cache: RwLock::new(HashMap::new()),
        }
    }

    /// 替换密钥存储
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    /// 替换连接解析器
    pub fn with_connections(mut self, connections: Arc<dyn ConnectionResolver>) -> Self {
        self.connections = connections;
        self
    }

    /// 替换镜像推送传输
    pub fn with_registry(mut self, registry: Arc<dyn RegistryTransport>) -> Self {
        self.registry = registry;
        self
    }

    /// 设置是否启用诊断追踪
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// 共享指标注册表
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// 镜像推送传输
    pub fn registry(&self) -> &dyn RegistryTransport {
        self.registry.as_ref()
    }

    /// 是否启用诊断追踪
    pub fn is_trace(&self) -> bool {
        self.trace
    }

    /// 输出一条诊断追踪日志
    pub fn trace(&self, message: &str) {
        if self.trace {
            debug!(
                canary = %self.canary.name,
                namespace = %self.canary.namespace,
                "{}",
                message
            );
        }
    }

    /// 解析环境变量式取值
    ///
    /// 字面量直接返回；密钥引用经缓存后从密钥存储解析，缓存允许
    /// 多个检查并发读取。
    pub fn resolve_env_value(&self, var: &EnvVar) -> Result<String, CheckError> {
        if let Some(value) = &var.value {
            return Ok(value.clone());
        }

        let Some(source) = &var.value_from else {
            return Ok(String::new());
        };

        if let Ok(cache) = self.env_cache.read() {
            if let Some(value) = cache.get(&source.env) {
                return Ok(value.clone());
            }
        }

        let value = self.secrets.resolve(&source.env)?;
        if let Ok(mut cache) = self.env_cache.write() {
            cache.insert(source.env.clone(), value.clone());
        }
        Ok(value)
    }

    /// 解析具名连接
    pub fn connection(&self, name: &str) -> Result<Connection, CheckError> {
        self.connections
            .lookup(name)
            .ok_or_else(|| CheckError::UnknownConnection(name.to_string()))
    }

    /// 从检查自身的字段组装连接（未引用具名连接时的回退路径）
    pub fn connection_for(&self, check: &HttpCheck) -> Result<Connection, CheckError> {
        if let Some(name) = &check.connection {
            return self.connection(name);
        }

        let username = match &check.username {
            Some(var) => self.resolve_env_value(var)?,
            None => String::new(),
        };
        let password = match &check.password {
            Some(var) => self.resolve_env_value(var)?,
            None => String::new(),
        };

        Ok(Connection {
            url: check.target().to_string(),
            username,
            password,
            properties: HashMap::new(),
        })
    }

    /// 对输入做模板展开，金丝雀名称与命名空间作为模板变量暴露
    pub fn template(&self, input: &str) -> Result<String, CheckError> {
        let data = serde_json::json!({
            "canary": {
                "name": self.canary.name,
                "namespace": self.canary.namespace,
            }
        });
        self.templates
            .render_template(input, &data)
            .map_err(|e| CheckError::Template(e.to_string()))
    }
}
