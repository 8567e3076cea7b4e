//! # Cache Module
//!
//! 记忆检索的缓存层实现。
//!
//! ## 模块结构
//!
//! - `config`: 缓存配置
//! - `lru`: LRU + TTL 缓存核心实现
//! - `key`: 检索缓存键规则
//!
//! ## 特性
//!
//! - LRU 淘汰策略 (严格访问顺序)
//! - TTL 支持 (过期条目在下一次访问前被清理)
//! - 线程安全 (单一互斥锁)
//! - 缓存统计
//! - 按用户前缀失效
//!
//! ## 示例
//!
//! ```rust
//! use recall_core::cache::{CacheConfig, CacheKey, LruCache};
//!
//! let cache: LruCache<String, Vec<String>> = LruCache::new(CacheConfig::default());
//!
//! let key = CacheKey::memories("user-1", "what is my name?", 5);
//! cache.set(key.clone(), vec!["Name is Ana".to_string()]);
//! assert!(cache.get(&key).is_some());
//!
//! // 写入后按用户失效
//! cache.invalidate_prefix(&CacheKey::user_prefix("user-1"));
//! assert!(cache.get(&key).is_none());
//! ```

pub mod config;
pub mod key;
pub mod lru;

pub use config::CacheConfig;
pub use key::CacheKey;
pub use lru::{CacheMetrics, CacheStats, LruCache};
