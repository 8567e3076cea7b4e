//! # LRU Cache Implementation
//!
//! 线程安全的 LRU (Least Recently Used) + TTL 缓存实现。
//!
//! ## 特性
//!
//! - 基于 `lru::LruCache` 的 O(1) 访问顺序维护
//! - 单一互斥锁保护所有读/改/淘汰操作，"检查容量 → 淘汰" 为原子操作
//! - TTL 支持，`get` 前先清理全局过期条目
//! - 缓存统计 (命中率、淘汰数等)
//! - 按谓词/前缀批量失效
//!
//! ## 示例
//!
//! ```rust
//! use recall_core::cache::{CacheConfig, LruCache};
//! use std::time::Duration;
//!
//! let cache: LruCache<String, u32> = LruCache::new(CacheConfig::new(2, Duration::from_secs(300)));
//!
//! cache.set("a".to_string(), 1);
//! cache.set("b".to_string(), 2);
//! cache.set("c".to_string(), 3);
//!
//! assert_eq!(cache.get("a"), None);
//! assert_eq!(cache.get("b"), Some(2));
//! assert_eq!(cache.stats().size, 2);
//! ```

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::config::CacheConfig;

/// 缓存统计指标
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// 命中次数
    hits: AtomicU64,
    /// 未命中次数
    misses: AtomicU64,
    /// 淘汰次数
    evictions: AtomicU64,
    /// 过期清理次数
    expirations: AtomicU64,
    /// 失效次数
    invalidations: AtomicU64,
}

impl CacheMetrics {
    /// 创建新的统计实例
    pub fn new() -> Self {
        Self::default()
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// 获取命中次数
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// 获取未命中次数
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// 获取淘汰次数
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// 获取过期清理次数
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// 获取失效次数
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// 计算命中率 (0.0 - 1.0)，从未访问时为 0
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            return 0.0;
        }
        (hits as f64) / (total as f64)
    }

    /// 重置所有统计
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
}

/// 缓存统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
}

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// 缓存的值
    value: V,
    /// 过期时间点 = 写入时间 + TTL
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// `now >= expires_at` 即视为过期
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// LRU 缓存内部状态
///
/// `lru::LruCache` 以无界模式使用，容量由外层按配置控制，
/// 以便支持 `max_entries == 0` 的禁用模式。
struct LruCacheState<K: Hash + Eq, V> {
    entries: lru::LruCache<K, CacheEntry<V>>,
}

impl<K: Hash + Eq + Clone, V> LruCacheState<K, V> {
    fn new() -> Self {
        Self {
            entries: lru::LruCache::unbounded(),
        }
    }

    /// 移除过期的条目
    fn remove_expired_entries(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }

    /// 移除满足谓词的条目
    fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let matched: Vec<K> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matched {
            self.entries.pop(key);
        }
        matched.len()
    }
}

/// LRU (Least Recently Used) + TTL 缓存
///
/// 所有操作都在内存中完成，不会失败。克隆出去的值与缓存内部互不影响。
pub struct LruCache<K: Hash + Eq, V> {
    /// 缓存配置
    config: CacheConfig,
    /// 缓存存储
    state: Mutex<LruCacheState<K, V>>,
    /// 缓存统计
    metrics: CacheMetrics,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// 创建新的 LRU 缓存
    pub fn new(config: CacheConfig) -> Self {
        tracing::info!(
            "Cache initialized (max_entries={}, ttl={}s, enabled={})",
            config.max_entries,
            config.default_ttl.as_secs(),
            config.enabled
        );
        Self {
            config,
            state: Mutex::new(LruCacheState::new()),
            metrics: CacheMetrics::new(),
        }
    }

    /// 获取缓存值
    ///
    /// 先清理全局过期条目，命中时将条目提升为最近访问。
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();

        let expired = state.remove_expired_entries(Instant::now());
        if expired > 0 {
            self.metrics.record_expirations(expired);
        }

        match state.entries.get(key) {
            Some(entry) => {
                self.metrics.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// 添加或更新缓存，使用默认 TTL
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// 添加或更新缓存
    ///
    /// 超出容量时淘汰最久未访问的条目。容量为 0 时不存储。
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let capacity = self.config.effective_capacity();
        if capacity == 0 {
            return;
        }

        let mut state = self.state.lock();
        state.entries.put(key, CacheEntry::new(value, ttl));

        while state.entries.len() > capacity {
            if state.entries.pop_lru().is_some() {
                self.metrics.record_eviction();
                tracing::debug!("Cache evicted least recently used entry");
            }
        }
    }

    /// 使缓存失效
    ///
    /// 键不存在时静默返回 `false`。
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.state.lock().entries.pop(key).is_some();
        if removed {
            self.metrics.record_invalidations(1);
        }
        removed
    }

    /// 批量失效满足谓词的条目，返回移除数量
    pub fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let removed = self.state.lock().remove_where(predicate);
        self.metrics.record_invalidations(removed);
        removed
    }

    /// 清空缓存
    ///
    /// 在同一把锁内移除所有条目及其过期信息，统计保留。
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// 移除过期的条目，返回移除数量
    pub fn remove_expired_entries(&self) -> usize {
        let count = self.state.lock().remove_expired_entries(Instant::now());
        self.metrics.record_expirations(count);
        count
    }

    /// 是否包含未过期的指定键 (不影响访问顺序和统计)
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.lock();
        state
            .entries
            .peek(key)
            .map(|entry| !entry.is_expired_at(Instant::now()))
            .unwrap_or(false)
    }

    /// 当前条目数 (可能包含尚未清理的过期条目)
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取缓存统计快照
    pub fn stats(&self) -> CacheStats {
        let size = self.len();
        CacheStats {
            size,
            max_size: self.config.effective_capacity(),
            ttl_secs: self.config.default_ttl.as_secs(),
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
            hit_rate: self.metrics.hit_rate(),
            evictions: self.metrics.evictions(),
            expirations: self.metrics.expirations(),
            invalidations: self.metrics.invalidations(),
        }
    }

    /// 获取统计指标 (内部引用)
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// 获取配置
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + AsRef<str>,
    V: Clone,
{
    /// 按键前缀批量失效，返回移除数量
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.invalidate_where(|key| key.as_ref().starts_with(prefix))
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// 启动后台过期清理任务
    ///
    /// 长会话中即使没有读操作，过期条目也会被回收。
    pub fn start_expiration_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;
                let count = self.remove_expired_entries();
                if count > 0 {
                    tracing::debug!("Removed {} expired cache entries", count);
                }
            }
        })
    }
}
