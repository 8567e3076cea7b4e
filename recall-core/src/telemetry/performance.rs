//! # Performance Monitor
//!
//! 记录各操作的耗时，维护滚动统计，并在超出阈值时告警。
//! 监控本身从不改变调用方的控制流。
//!
//! ## 示例
//!
//! ```rust
//! use recall_core::telemetry::PerformanceMonitor;
//!
//! let monitor = PerformanceMonitor::new(true, 500);
//! monitor.set_threshold("retrieve_memories", 200);
//!
//! assert!(monitor.record_time("retrieve_memories", 0.35).is_some());
//! assert!(monitor.record_time("retrieve_memories", 0.05).is_none());
//!
//! let stats = monitor.get_statistics("retrieve_memories");
//! assert_eq!(stats.count, 2);
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::{PerformanceConfig, WINDOW_SIZE};

/// 超出阈值超过该百分比时告警升级
const ESCALATION_PERCENT: f64 = 200.0;

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// 超出阈值
    Warning,
    /// 超出阈值 200% 以上
    Critical,
}

/// 慢操作告警
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowOperationAlert {
    pub operation: String,
    pub elapsed_ms: f64,
    pub threshold_ms: f64,
    /// 超出阈值的百分比
    pub percent_over: f64,
    /// 本次样本之前滚动窗口的平均耗时
    pub average_ms: Option<f64>,
    pub severity: AlertSeverity,
}

impl SlowOperationAlert {
    fn new(operation: &str, elapsed: f64, threshold: f64, prior_average: Option<f64>) -> Self {
        let elapsed_ms = elapsed * 1000.0;
        let threshold_ms = threshold * 1000.0;
        let percent_over = if threshold_ms > 0.0 {
            (elapsed_ms / threshold_ms - 1.0) * 100.0
        } else {
            f64::INFINITY
        };
        let severity = if percent_over > ESCALATION_PERCENT {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };

        Self {
            operation: operation.to_string(),
            elapsed_ms,
            threshold_ms,
            percent_over,
            average_ms: prior_average.map(|avg| avg * 1000.0),
            severity,
        }
    }

    /// 本次样本相对平均值的倍数
    pub fn ratio_to_average(&self) -> Option<f64> {
        self.average_ms
            .filter(|avg| *avg > 0.0)
            .map(|avg| self.elapsed_ms / avg)
    }

    fn emit(&self) {
        match self.severity {
            AlertSeverity::Warning => tracing::warn!(
                operation = %self.operation,
                elapsed_ms = self.elapsed_ms,
                threshold_ms = self.threshold_ms,
                "{}",
                self
            ),
            AlertSeverity::Critical => tracing::error!(
                operation = %self.operation,
                elapsed_ms = self.elapsed_ms,
                threshold_ms = self.threshold_ms,
                "{}",
                self
            ),
        }
    }
}

impl fmt::Display for SlowOperationAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slow operation: {} took {:.2}ms (threshold: {:.2}ms, +{:.1}%)",
            self.operation, self.elapsed_ms, self.threshold_ms, self.percent_over
        )?;
        if let (Some(avg), Some(ratio)) = (self.average_ms, self.ratio_to_average()) {
            write!(f, " (average: {:.2}ms, {:.1}x the average)", avg, ratio)?;
        }
        Ok(())
    }
}

/// 单个操作的累计指标
#[derive(Debug, Default)]
struct OperationMetrics {
    /// 累计次数 (单调递增)
    count: u64,
    /// 累计耗时 (秒)
    total_time: f64,
    /// 最近 N 次耗时，先进先出
    window: VecDeque<f64>,
}

impl OperationMetrics {
    fn window_average(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
        }
    }

    fn push(&mut self, seconds: f64) {
        self.count += 1;
        self.total_time += seconds;
        self.window.push_back(seconds);
        if self.window.len() > WINDOW_SIZE {
            self.window.pop_front();
        }
    }
}

/// 累计指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OperationMetricsSnapshot {
    pub count: u64,
    pub total_time: f64,
    pub avg_time: f64,
}

/// 基于滚动窗口的统计 (秒)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OperationStatistics {
    pub count: usize,
    pub avg: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl OperationStatistics {
    fn from_samples(samples: &VecDeque<f64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let avg = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        Self {
            count,
            avg,
            median,
            min: sorted[0],
            max: sorted[count - 1],
            p90: percentile(&sorted, 900),
            p95: percentile(&sorted, 950),
            p99: percentile(&sorted, 990),
        }
    }
}

/// 百分位: index = floor(count * p) - 1，index <= 0 时取第一个元素
///
/// `per_mille` 用千分数表示 p，避免浮点乘法的取整误差。
fn percentile(sorted: &[f64], per_mille: usize) -> f64 {
    let idx = sorted.len() * per_mille / 1000;
    if idx == 0 {
        sorted[0]
    } else {
        sorted[idx - 1]
    }
}

/// 性能监控器
///
/// 多个会话可以同时记录耗时，计数器在内部锁保护下修改。
pub struct PerformanceMonitor {
    enabled: AtomicBool,
    /// 未设置阈值的操作使用的默认阈值 (秒)
    default_threshold: f64,
    thresholds: RwLock<HashMap<String, f64>>,
    metrics: Mutex<HashMap<String, OperationMetrics>>,
}

impl PerformanceMonitor {
    /// 创建监控器，阈值单位为毫秒
    pub fn new(enabled: bool, default_threshold_ms: u64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            default_threshold: default_threshold_ms as f64 / 1000.0,
            thresholds: RwLock::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
        }
    }

    /// 从配置创建，同时应用按操作设置的阈值
    pub fn from_config(config: &PerformanceConfig) -> Self {
        let monitor = Self::new(config.enabled, config.default_threshold_ms);
        for (operation, threshold_ms) in &config.thresholds {
            monitor.set_threshold(operation, *threshold_ms);
        }
        monitor
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// 设置某个操作的告警阈值 (毫秒)
    pub fn set_threshold(&self, operation: &str, threshold_ms: u64) {
        self.thresholds
            .write()
            .insert(operation.to_string(), threshold_ms as f64 / 1000.0);
    }

    /// 获取某个操作的告警阈值 (秒)
    pub fn get_threshold(&self, operation: &str) -> f64 {
        self.thresholds
            .read()
            .get(operation)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// 记录一次耗时 (秒)
    ///
    /// 超出阈值时输出告警日志并返回告警内容；禁用时不做任何事。
    pub fn record_time(&self, operation: &str, seconds: f64) -> Option<SlowOperationAlert> {
        if !self.is_enabled() {
            return None;
        }

        let threshold = self.get_threshold(operation);

        let prior_average = {
            let mut metrics = self.metrics.lock();
            let entry = metrics.entry(operation.to_string()).or_default();
            let prior_average = entry.window_average();
            entry.push(seconds);
            prior_average
        };

        if seconds > threshold {
            let alert = SlowOperationAlert::new(operation, seconds, threshold, prior_average);
            alert.emit();
            Some(alert)
        } else {
            None
        }
    }

    /// 获取累计指标，未知操作返回全 0
    pub fn get_metrics(&self, operation: &str) -> OperationMetricsSnapshot {
        let metrics = self.metrics.lock();
        match metrics.get(operation) {
            Some(m) => OperationMetricsSnapshot {
                count: m.count,
                total_time: m.total_time,
                avg_time: if m.count > 0 {
                    m.total_time / m.count as f64
                } else {
                    0.0
                },
            },
            None => OperationMetricsSnapshot::default(),
        }
    }

    /// 平均耗时 (秒)，没有记录时返回 None
    pub fn get_average_time(&self, operation: &str) -> Option<f64> {
        let snapshot = self.get_metrics(operation);
        if snapshot.count == 0 {
            None
        } else {
            Some(snapshot.avg_time)
        }
    }

    /// 基于滚动窗口的详细统计，未知操作返回全 0
    pub fn get_statistics(&self, operation: &str) -> OperationStatistics {
        let metrics = self.metrics.lock();
        metrics
            .get(operation)
            .map(|m| OperationStatistics::from_samples(&m.window))
            .unwrap_or_default()
    }

    /// 所有已记录操作的统计，按名称排序
    pub fn all_statistics(&self) -> BTreeMap<String, OperationStatistics> {
        let metrics = self.metrics.lock();
        metrics
            .iter()
            .map(|(name, m)| (name.clone(), OperationStatistics::from_samples(&m.window)))
            .collect()
    }

    /// 输出统计摘要
    ///
    /// 中位数超过阈值时额外告警 (持续性慢，而非偶发)，并返回 `true`。
    pub fn log_statistics(&self, operation: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let stats = self.get_statistics(operation);
        if stats.count == 0 {
            return false;
        }

        tracing::info!(
            "Statistics for '{}' ({} runs): avg {:.2}ms | median {:.2}ms | min {:.2}ms | max {:.2}ms | p90 {:.2}ms | p95 {:.2}ms | p99 {:.2}ms",
            operation,
            stats.count,
            stats.avg * 1000.0,
            stats.median * 1000.0,
            stats.min * 1000.0,
            stats.max * 1000.0,
            stats.p90 * 1000.0,
            stats.p95 * 1000.0,
            stats.p99 * 1000.0,
        );

        let threshold = self.get_threshold(operation);
        if stats.median > threshold {
            tracing::warn!(
                operation = %operation,
                "Operation '{}' is consistently above its threshold ({:.2}ms > {:.2}ms)",
                operation,
                stats.median * 1000.0,
                threshold * 1000.0
            );
            true
        } else {
            false
        }
    }

    /// 清除单个操作的指标
    pub fn clear_operation(&self, operation: &str) {
        self.metrics.lock().remove(operation);
    }

    /// 清除所有指标 (阈值保留)
    pub fn reset(&self) {
        self.metrics.lock().clear();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::from_config(&PerformanceConfig::default())
    }
}
