//! 配置加载器实现
//!
//! 提供多文档YAML金丝雀配置解析、环境变量替换和验证功能

use crate::config::types::{validate_canary, Canary};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置，一个文件可以包含多个YAML文档
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Vec<Canary>>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<Vec<Canary>>;

    /// 验证单个金丝雀配置
    fn validate(&self, canary: &Canary) -> Result<()>;
}

/// YAML配置加载器实现
#[derive(Debug, Clone)]
pub struct YamlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl YamlConfigLoader {
    /// 创建新的YAML配置加载器
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中 ${VAR_NAME} 格式的环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析多文档YAML内容
    fn parse_yaml(&self, content: &str) -> Result<Vec<Canary>> {
        let processed_content = self.substitute_env_vars(content)?;

        let mut canaries = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&processed_content) {
            let canary = Canary::deserialize(document)
                .map_err(|e| ConfigError::ParseError(format!("YAML解析失败: {}", e)))?;
            canaries.push(canary);
        }

        Ok(canaries)
    }
}

#[async_trait]
impl ConfigLoader for YamlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Vec<Canary>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let canaries = self.parse_yaml(&content)?;
        for canary in &canaries {
            self.validate(canary)?;
        }

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", canaries);

        Ok(canaries)
    }

    async fn load_from_string(&self, content: &str) -> Result<Vec<Canary>> {
        let canaries = self.parse_yaml(content)?;
        for canary in &canaries {
            self.validate(canary)?;
        }
        Ok(canaries)
    }

    fn validate(&self, canary: &Canary) -> Result<()> {
        validate_canary(canary).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MULTI_DOC: &str = r#"
name: first
spec:
  http:
    - url: https://one.example.com
      responseCodes: [200]
---
name: second
spec:
  http:
    - url: https://two.example.com
      responseCodes: [200]
"#;

    #[tokio::test]
    async fn test_load_multi_document_yaml() {
        let loader = YamlConfigLoader::new(false);
        let canaries = loader.load_from_string(MULTI_DOC).await.unwrap();

        assert_eq!(canaries.len(), 2);
        assert_eq!(canaries[0].name, "first");
        assert_eq!(canaries[1].name, "second");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MULTI_DOC.as_bytes()).unwrap();

        let loader = YamlConfigLoader::new(false);
        let canaries = loader.load_from_file(file.path()).await.unwrap();
        assert_eq!(canaries.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let loader = YamlConfigLoader::new(false);
        let result = loader.load_from_file("/does/not/exist.yaml").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unparsable_yaml_is_error() {
        let loader = YamlConfigLoader::new(false);
        let result = loader.load_from_string("name: [unclosed").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_env_substitution() {
        std::env::set_var("CANARY_LOADER_TEST_URL", "https://env.example.com");
        let loader = YamlConfigLoader::new(true);
        let canaries = loader
            .load_from_string(
                r#"
name: env
spec:
  http:
    - url: ${CANARY_LOADER_TEST_URL}/health
"#,
            )
            .await
            .unwrap();

        assert_eq!(
            canaries[0].spec.http[0].url,
            "https://env.example.com/health"
        );
    }

    #[tokio::test]
    async fn test_env_substitution_missing_var_is_error() {
        let loader = YamlConfigLoader::new(true);
        let result = loader
            .load_from_string("name: ${CANARY_LOADER_TEST_MISSING_VAR}")
            .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("CANARY_LOADER_TEST_MISSING_VAR"));
    }

    #[tokio::test]
    async fn test_validation_rejects_invalid_method() {
        let loader = YamlConfigLoader::new(false);
        let result = loader
            .load_from_string(
                r#"
name: bad
spec:
  http:
    - url: https://example.com
      method: FETCH
"#,
            )
            .await;
        assert!(result.is_err());
    }
}
