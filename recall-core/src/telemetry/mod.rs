//! 性能遥测模块
//!
//! PerformanceMonitor 记录各操作耗时，`measure` 把任意调用包装成可计时的操作。
//!
//! # 架构
//!
//! ```text
//! retrieve_memories ─┐
//! add_memory ────────┤
//! clear_memories ────┼── measure() ──→ PerformanceMonitor ──→ tracing (慢操作告警)
//! chat_completion ───┤                      │
//! process_message ───┘                      └── 滚动窗口统计 (p90/p95/p99)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod measure;
pub mod performance;

pub use measure::{measure, measure_sync, TimingGuard};
pub use performance::{
    AlertSeverity, OperationMetricsSnapshot, OperationStatistics, PerformanceMonitor,
    SlowOperationAlert,
};

/// 滚动窗口大小
pub const WINDOW_SIZE: usize = 100;

/// 默认告警阈值 (毫秒)
pub const DEFAULT_THRESHOLD_MS: u64 = 500;

/// 性能监控配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// 是否启用监控
    pub enabled: bool,
    /// 默认告警阈值 (毫秒)
    pub default_threshold_ms: u64,
    /// 按操作设置的阈值 (毫秒)
    pub thresholds: HashMap<String, u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_threshold_ms: DEFAULT_THRESHOLD_MS,
            thresholds: HashMap::new(),
        }
    }
}

impl PerformanceConfig {
    /// 设置默认阈值
    pub fn with_default_threshold(mut self, threshold_ms: u64) -> Self {
        self.default_threshold_ms = threshold_ms;
        self
    }

    /// 设置某个操作的阈值
    pub fn with_threshold(mut self, operation: impl Into<String>, threshold_ms: u64) -> Self {
        self.thresholds.insert(operation.into(), threshold_ms);
        self
    }
}
