//! # Cache Configuration
//!
//! 缓存配置管理模块。
//!
//! ## 配置选项
//!
//! - `enabled`: 是否启用缓存
//! - `max_entries`: 最大缓存条目数 (`0` 等同于禁用)
//! - `default_ttl`: 默认 TTL (Time To Live)
//!
//! ## 示例
//!
//! ```rust
//! use recall_core::cache::CacheConfig;
//! use std::time::Duration;
//!
//! // 使用默认配置
//! let config = CacheConfig::default();
//!
//! // 自定义配置
//! let config = CacheConfig::new(200, Duration::from_secs(600));
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RecallError, Result};

/// 默认最大条目数
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// 默认 TTL (5 分钟)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    ///
    /// 全局开关，关闭后 `set` 不存储任何内容，`get` 总是未命中。
    pub enabled: bool,

    /// 最大缓存条目数
    ///
    /// 超过此数量时，淘汰最久未访问的条目。`0` 表示禁用缓存，
    /// 用于和无缓存模式做性能对比。
    pub max_entries: usize,

    /// 默认 TTL
    ///
    /// 超过此时间的条目无论访问多频繁都视为过期。
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    /// 创建新的缓存配置
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            enabled: true,
            max_entries,
            default_ttl,
        }
    }

    /// 创建禁用状态的配置 (无缓存模式)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_entries: 0,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// 设置是否启用缓存
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 设置最大缓存条目数
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// 设置默认 TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// 实际生效的容量，禁用时为 0
    pub fn effective_capacity(&self) -> usize {
        if self.enabled {
            self.max_entries
        } else {
            0
        }
    }

    /// 验证配置是否有效
    ///
    /// `max_entries == 0` 合法 (禁用模式)，TTL 必须大于 0。
    pub fn validate(&self) -> Result<()> {
        if self.max_entries > 100_000 {
            return Err(RecallError::configuration(
                "cache.max_entries is too large (max: 100000)",
            ));
        }

        if self.default_ttl.is_zero() {
            return Err(RecallError::configuration(
                "cache.default_ttl must be greater than 0",
            ));
        }

        if self.default_ttl.as_secs() > 86400 {
            return Err(RecallError::configuration(
                "cache.default_ttl is too large (max: 86400s = 1 day)",
            ));
        }

        Ok(())
    }
}

/// TTL 在配置文件中以秒为单位
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
