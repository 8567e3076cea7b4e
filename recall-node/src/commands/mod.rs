//! CLI commands

pub mod ask;
pub mod bench;
pub mod chat;
pub mod clear;

use colored::*;
use recall_core::cache::CacheStats;
use recall_core::memory::MemoryRecord;
use recall_core::telemetry::PerformanceMonitor;

/// 秒 → 毫秒文本
pub(crate) fn ms(seconds: f64) -> String {
    format!("{:.2}ms", seconds * 1000.0)
}

/// 打印使用到的记忆
pub(crate) fn print_memories(memories: &[MemoryRecord]) {
    if memories.is_empty() {
        return;
    }

    println!("{}", format!("Memories used ({})", memories.len()).cyan().bold());
    for memory in memories {
        let relevance = memory
            .score
            .map(|s| format!(" [{:.0}%]", s * 100.0))
            .unwrap_or_default();
        println!("  - {}{}", memory.text, relevance.dimmed());
    }
}

/// 打印监控统计与缓存统计
pub(crate) fn print_statistics(monitor: &PerformanceMonitor, cache: &CacheStats) {
    let all = monitor.all_statistics();
    if all.is_empty() {
        println!("No operations recorded yet");
    } else {
        println!(
            "{:<20} {:>6} {:>10} {:>10} {:>10} {:>10}",
            "operation".bold(),
            "count",
            "avg",
            "median",
            "p95",
            "max"
        );
        for (op, stats) in &all {
            println!(
                "{:<20} {:>6} {:>10} {:>10} {:>10} {:>10}",
                op,
                stats.count,
                ms(stats.avg),
                ms(stats.median),
                ms(stats.p95),
                ms(stats.max)
            );
        }
    }

    println!(
        "cache: {}/{} entries, {} hits, {} misses, hit rate {:.1}%",
        cache.size,
        cache.max_size,
        cache.hits,
        cache.misses,
        cache.hit_rate * 100.0
    );
}
