//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Canary Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum CanaryError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 检查执行相关错误
    #[error("检查执行错误: {0}")]
    Check(#[from] CheckError),

    /// 指标注册错误
    #[error("指标注册错误: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 检查执行错误类型
///
/// 这些错误最终都会被检查器转换为失败的检查结果，错误文本会出现在
/// 结果的失败消息中，因此保持消息简短并携带原始错误信息。
#[derive(Error, Debug)]
pub enum CheckError {
    /// HTTP请求错误，展示底层传输错误的原始文本
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    /// 无效的HTTP方法
    #[error("invalid http method: {0}")]
    InvalidMethod(String),

    /// 请求头解析失败
    #[error("failed getting header {name}: {message}")]
    Header { name: String, message: String },

    /// 未知的具名连接
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    /// 密钥引用无法解析
    #[error("unresolved secret reference: {0}")]
    UnresolvedSecret(String),

    /// 模板渲染失败
    #[error("template error: {0}")]
    Template(String),

    /// 摘要认证失败
    #[error("digest auth error: {0}")]
    Auth(String),

    /// 镜像推送传输错误
    #[error("registry transport error: {0}")]
    Transport(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, CanaryError>;
