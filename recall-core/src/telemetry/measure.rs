//! # Measurement Wrapper
//!
//! 对任意调用计时并把结果原样返回。计时放在 `Drop` 中，
//! 因此返回错误、panic 或 future 被取消时同样会记录耗时。
//!
//! ```rust
//! use recall_core::telemetry::{measure, PerformanceMonitor};
//!
//! # async fn example() {
//! let monitor = PerformanceMonitor::new(true, 500);
//! let value: Result<u32, String> = measure(&monitor, "lookup", async { Ok(7) }).await;
//! assert_eq!(value, Ok(7));
//! assert_eq!(monitor.get_metrics("lookup").count, 1);
//! # }
//! ```

use std::future::Future;
use std::time::Instant;

use super::PerformanceMonitor;

/// 计时守卫，离开作用域时记录耗时
pub struct TimingGuard<'a> {
    monitor: &'a PerformanceMonitor,
    operation: &'a str,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(monitor: &'a PerformanceMonitor, operation: &'a str) -> Self {
        Self {
            monitor,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.monitor.record_time(self.operation, elapsed);
    }
}

/// 对异步调用计时
///
/// 监控禁用时直接执行，不做任何计时。
pub async fn measure<F, T>(monitor: &PerformanceMonitor, operation: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    if !monitor.is_enabled() {
        return fut.await;
    }

    let _guard = TimingGuard::new(monitor, operation);
    fut.await
}

/// 对同步调用计时
pub fn measure_sync<F, T>(monitor: &PerformanceMonitor, operation: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    if !monitor.is_enabled() {
        return f();
    }

    let _guard = TimingGuard::new(monitor, operation);
    f()
}
