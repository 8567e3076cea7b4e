//! # Configuration Module
//!
//! 聚合各组件的配置，并提供分层加载。
//!
//! ## 配置层级
//!
//! ```text
//! 1. 默认值
//! 2. 配置文件 (recall.toml)
//! 3. 环境变量 (最高优先级)
//! ```
//!
//! ## 配置文件示例
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 100
//! default_ttl = 300
//!
//! [performance]
//! enabled = true
//! default_threshold_ms = 500
//!
//! [performance.thresholds]
//! chat_completion = 5000
//!
//! [memory]
//! retrieval_limit = 5
//! persist_strategies = ["transcript", "messages", "plain_text"]
//!
//! [llm]
//! model = "gpt-4o-mini"
//!
//! [memory_api]
//! url = "http://localhost:8000"
//! ```

use serde::{Deserialize, Serialize};

use crate::ai::LlmConfig;
use crate::cache::CacheConfig;
use crate::error::{RecallError, Result};
use crate::memory::{MemoryApiConfig, OrchestratorConfig, PromptConfig};
use crate::telemetry::PerformanceConfig;

mod loader;

pub use loader::ConfigLoader;

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// 检索缓存
    pub cache: CacheConfig,
    /// 性能监控
    pub performance: PerformanceConfig,
    /// 编排器
    pub memory: OrchestratorConfig,
    /// 语言模型
    pub llm: LlmConfig,
    /// 记忆服务
    pub memory_api: MemoryApiConfig,
    /// 用户 system prompt 来源
    pub prompt: PromptConfig,
}

impl RecallConfig {
    /// 从 TOML 文本解析
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RecallError::other(format!("Failed to serialize config: {}", e)))
    }

    /// 验证全部配置
    ///
    /// 缺少 OpenAI key、缺少记忆服务地址或数值越界时失败。
    pub fn validate(&self) -> Result<()> {
        self.validate_local()?;
        self.llm.validate()?;
        self.memory_api.validate()?;
        Ok(())
    }

    /// 只验证不依赖外部服务的部分 (缓存、监控、编排器)
    pub fn validate_local(&self) -> Result<()> {
        self.cache.validate()?;
        if self.performance.default_threshold_ms == 0 {
            return Err(RecallError::configuration(
                "performance.default_threshold_ms must be > 0",
            ));
        }
        if let Some((op, _)) = self.performance.thresholds.iter().find(|(_, ms)| **ms == 0) {
            return Err(RecallError::configuration(format!(
                "performance.thresholds.{} must be > 0",
                op
            )));
        }
        self.memory.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PersistStrategy;
    use std::time::Duration;

    fn valid() -> RecallConfig {
        let mut config = RecallConfig::default();
        config.llm.api_key = Some("sk-test".into());
        config.memory_api.url = Some("http://localhost:8000".into());
        config
    }

    #[test]
    fn test_defaults() {
        let config = RecallConfig::default();
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.performance.default_threshold_ms, 500);
        assert_eq!(config.memory.retrieval_limit, 5);
        assert_eq!(config.memory.persist_strategies, vec![PersistStrategy::Transcript]);
        assert!(config.validate_local().is_ok());
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(RecallConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());

        let mut no_url = valid();
        no_url.memory_api.url = None;
        assert!(matches!(no_url.validate(), Err(RecallError::Configuration(_))));
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = valid();
        config.performance.default_threshold_ms = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.performance.thresholds.insert("add_memory".into(), 0);
        assert!(config.validate().is_err());

        let mut config = valid();
        config.cache.max_entries = 1_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_cache_section_is_configuration_error() {
        let mut config = valid();
        config.cache.default_ttl = Duration::ZERO;
        match config.validate_local() {
            Err(RecallError::Configuration(msg)) => assert!(msg.contains("default_ttl")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_toml() {
        let config = RecallConfig::from_toml(
            r#"
            [cache]
            max_entries = 10

            [memory]
            persist_strategies = ["transcript", "plain_text"]
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(
            config.memory.persist_strategies,
            vec![PersistStrategy::Transcript, PersistStrategy::PlainText]
        );
        assert_eq!(config.memory.retrieval_limit, 5);
    }

    #[test]
    fn test_toml_template_parses_back() {
        let text = valid().to_toml().unwrap();
        let parsed = RecallConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, valid());
    }

    #[test]
    fn test_bad_toml_is_error() {
        let err = RecallConfig::from_toml("[cache\nmax_entries = ").unwrap_err();
        assert!(matches!(err, RecallError::Toml(_)));
    }
}
