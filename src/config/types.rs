//! 金丝雀配置数据结构定义
//!
//! 定义金丝雀及各类检查的配置结构体和验证逻辑

use crate::context::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 金丝雀：从单个配置单元加载的一组具名检查
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Canary {
    /// 金丝雀名称，为空时由运行器根据文件名推导
    #[serde(default)]
    pub name: String,
    /// 命名空间
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// 检查定义
    #[serde(default)]
    pub spec: CanarySpec,
    /// 具名连接，供检查通过`connection`字段引用
    #[serde(default)]
    pub connections: HashMap<String, Connection>,
}

/// 检查定义，按检查类型分组，每组内保持声明顺序
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanarySpec {
    /// HTTP检查列表
    #[serde(default)]
    pub http: Vec<HttpCheck>,
    /// 镜像推送检查列表
    #[serde(default)]
    pub docker_push: Vec<DockerPushCheck>,
}

/// 环境变量式取值：字面量`value`优先，否则通过`valueFrom`从密钥存储解析
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    #[serde(default)]
    pub name: String,
    pub value: Option<String>,
    pub value_from: Option<EnvVarSource>,
}

/// 密钥引用来源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    /// 密钥存储中的键名
    pub env: String,
}

impl EnvVar {
    /// 构造一个字面量取值
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }

    /// 构造一个密钥引用取值
    pub fn from_secret(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            value_from: Some(EnvVarSource { env: key.into() }),
        }
    }
}

/// JSONPath响应断言
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JsonCheck {
    /// JSONPath表达式
    pub path: String,
    /// 期望的标量值（按字符串比较）
    #[serde(default)]
    pub value: String,
}

/// HTTP检查配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpCheck {
    /// 检查名称，为空时使用目标URL
    #[serde(default)]
    pub name: String,
    /// 描述
    pub description: Option<String>,
    /// 已废弃的url别名，与url互斥
    #[serde(default)]
    pub endpoint: String,
    /// 目标URL
    #[serde(default)]
    pub url: String,
    /// 具名连接引用，优先于url/username/password
    pub connection: Option<String>,
    /// HTTP方法
    #[serde(default = "default_method")]
    pub method: String,
    /// 请求头，值支持密钥引用
    #[serde(default)]
    pub headers: Vec<EnvVar>,
    /// 请求体
    #[serde(default)]
    pub body: String,
    /// 是否对请求体做模板展开
    #[serde(default)]
    pub template_body: bool,
    /// 允许的响应状态码列表，为空时按默认成功策略（2xx）判定
    #[serde(default)]
    pub response_codes: Vec<u16>,
    /// 延迟阈值（毫秒），同时作为请求超时；0表示不限制
    #[serde(default)]
    pub threshold_millis: u64,
    /// 响应体必须包含的子串
    #[serde(default)]
    pub response_content: String,
    /// JSONPath响应断言
    #[serde(alias = "responseJSONContent")]
    pub response_json_content: Option<JsonCheck>,
    /// 证书最小剩余有效期（天）；0表示不检查
    #[serde(default, alias = "maxSSLExpiry")]
    pub max_ssl_expiry: u32,
    /// 基本认证用户名
    pub username: Option<EnvVar>,
    /// 基本认证密码
    pub password: Option<EnvVar>,
    /// 使用摘要（质询-响应）认证替代基本认证
    #[serde(default)]
    pub digest: bool,
}

impl Default for HttpCheck {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            endpoint: String::new(),
            url: String::new(),
            connection: None,
            method: default_method(),
            headers: Vec::new(),
            body: String::new(),
            template_body: false,
            response_codes: Vec::new(),
            threshold_millis: 0,
            response_content: String::new(),
            response_json_content: None,
            max_ssl_expiry: 0,
            username: None,
            password: None,
            digest: false,
        }
    }
}

impl HttpCheck {
    /// 检查的展示名称
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            self.target()
        }
    }

    /// 配置的目标URL（url优先，其次endpoint）
    pub fn target(&self) -> &str {
        if !self.url.is_empty() {
            &self.url
        } else {
            &self.endpoint
        }
    }

    /// 是否配置了JSONPath断言
    pub fn has_json_assertion(&self) -> bool {
        self.response_json_content
            .as_ref()
            .map(|c| !c.path.is_empty())
            .unwrap_or(false)
    }
}

/// 镜像仓库认证配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryAuth {
    pub username: EnvVar,
    pub password: EnvVar,
}

/// 镜像推送检查配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerPushCheck {
    /// 检查名称，为空时使用镜像引用
    #[serde(default)]
    pub name: String,
    /// 要推送的镜像引用（registry/repo:tag）
    pub image: String,
    /// 仓库认证
    #[serde(default)]
    pub auth: RegistryAuth,
}

impl DockerPushCheck {
    /// 检查的展示名称
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            &self.image
        }
    }
}

// 默认值函数
fn default_namespace() -> String {
    "default".to_string()
}
fn default_method() -> String {
    "GET".to_string()
}

/// 金丝雀配置验证函数
///
/// 只拒绝静态可判定的非法取值；互斥字段、缺失目标等问题在执行时
/// 转换为失败的检查结果而不是加载错误。
pub fn validate_canary(canary: &Canary) -> Result<(), String> {
    let valid_methods = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];

    for check in &canary.spec.http {
        let method = check.method.to_uppercase();
        if !valid_methods.contains(&method.as_str()) {
            return Err(format!(
                "检查 {} 的HTTP方法 {} 无效，支持的方法: {:?}",
                check.display_name(),
                check.method,
                valid_methods
            ));
        }

        for &code in &check.response_codes {
            if !(100..=599).contains(&code) {
                return Err(format!(
                    "检查 {} 的状态码 {} 无效",
                    check.display_name(),
                    code
                ));
            }
        }

        if let Some(json_check) = &check.response_json_content {
            if json_check.path.is_empty() {
                return Err(format!(
                    "检查 {} 的JSONPath断言缺少path",
                    check.display_name()
                ));
            }
        }
    }

    for check in &canary.spec.docker_push {
        if check.image.trim().is_empty() {
            return Err("镜像推送检查必须指定image".to_string());
        }
    }

    Ok(())
}
