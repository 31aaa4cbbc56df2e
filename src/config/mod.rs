//! 配置管理模块
//!
//! 提供金丝雀配置的数据结构、YAML加载和验证功能

pub mod loader;
pub mod types;

pub use loader::{ConfigLoader, YamlConfigLoader};
pub use types::{
    validate_canary, Canary, CanarySpec, DockerPushCheck, EnvVar, EnvVarSource, HttpCheck,
    JsonCheck, RegistryAuth,
};
