//! Cache benchmark
//!
//! 对同一组查询分别在有缓存和无缓存 (`max_entries = 0`) 的编排器上执行检索，
//! 并输出对比报告。查询由基础查询加上随机重复的子集组成，用来模拟真实的命中模式。

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use rand::seq::SliceRandom;
use rand::Rng;
use recall_core::cache::{CacheConfig, CacheStats};
use recall_core::memory::OP_RETRIEVE;
use recall_core::telemetry::{OperationStatistics, PerformanceMonitor};
use serde::Serialize;

use super::ms;
use crate::app::Components;

const BASE_QUERIES: [&str; 10] = [
    "What are the benefits of artificial intelligence?",
    "How do I implement an efficient caching system?",
    "Explain what embeddings are in NLP.",
    "How can I improve database performance?",
    "How does the PageRank algorithm work?",
    "What is the difference between machine learning and deep learning?",
    "How do I optimize SQL queries?",
    "What are transformers in AI?",
    "What are the challenges of quantum computing?",
    "What are the best practices for API security?",
];

const TOPICS: [&str; 3] = ["performance", "security", "usability"];

/// bench 参数
#[derive(Debug, Clone, Copy)]
pub struct BenchOptions {
    pub num_queries: usize,
    pub repeat_factor: usize,
    pub cache_size: usize,
}

/// 生成查询列表
///
/// 先取 `num_queries` 条基础查询 (不足时补充生成)，再追加 `repeat_factor - 1`
/// 轮重复，每轮随机抽取一半基础查询，最后打乱顺序。
pub fn generate_queries<R: Rng + ?Sized>(
    num_queries: usize,
    repeat_factor: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut base: Vec<String> = BASE_QUERIES
        .iter()
        .take(num_queries)
        .map(|q| q.to_string())
        .collect();
    for i in base.len()..num_queries {
        let topic = TOPICS.choose(rng).copied().unwrap_or("performance");
        base.push(format!("Test query {}: how do I improve {}?", i, topic));
    }

    let mut queries = base.clone();
    if !base.is_empty() {
        let repeat_count = (base.len() / 2).max(1);
        for _ in 1..repeat_factor.max(1) {
            queries.extend(base.choose_multiple(rng, repeat_count).cloned());
        }
    }

    queries.shuffle(rng);
    queries
}

/// 单次运行结果
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub total_secs: f64,
    pub avg_secs: f64,
    pub cache: CacheStats,
    pub retrieve: OperationStatistics,
}

/// 对比报告
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub queries: usize,
    pub unique_queries: usize,
    pub with_cache: RunResult,
    pub without_cache: RunResult,
    pub speedup: f64,
    pub time_saved_pct: f64,
}

impl BenchReport {
    pub fn new(queries: &[String], with_cache: RunResult, without_cache: RunResult) -> Self {
        let mut unique: Vec<&String> = queries.iter().collect();
        unique.sort();
        unique.dedup();

        let speedup = if with_cache.total_secs > 0.0 {
            without_cache.total_secs / with_cache.total_secs
        } else {
            0.0
        };
        let time_saved_pct = if without_cache.total_secs > 0.0 {
            (1.0 - with_cache.total_secs / without_cache.total_secs) * 100.0
        } else {
            0.0
        };

        Self {
            queries: queries.len(),
            unique_queries: unique.len(),
            with_cache,
            without_cache,
            speedup,
            time_saved_pct,
        }
    }

    fn print(&self) {
        let rule = "=".repeat(60);
        println!("\n{}", rule);
        println!("{:^60}", "PERFORMANCE REPORT".bold());
        println!("{}\n", rule);

        println!("{}", "CONFIGURATION".cyan().bold());
        println!("{:<30} {}", "Queries", self.queries);
        println!("{:<30} {}", "Unique queries", self.unique_queries);
        println!("{:<30} {}", "Cache hits", self.with_cache.cache.hits);
        println!("{:<30} {}", "Cache misses", self.with_cache.cache.misses);
        println!(
            "{:<30} {:.1}%",
            "Cache hit rate",
            self.with_cache.cache.hit_rate * 100.0
        );
        println!();

        println!("{}", "TIMINGS".cyan().bold());
        println!("{:<30} {:.2}s", "Total with cache", self.with_cache.total_secs);
        println!("{:<30} {:.2}s", "Total without cache", self.without_cache.total_secs);
        println!("{:<30} {} per query", "Average with cache", ms(self.with_cache.avg_secs));
        println!("{:<30} {} per query", "Average without cache", ms(self.without_cache.avg_secs));
        println!("{:<30} {:.2}x faster with cache", "Speedup", self.speedup);
        println!("{:<30} {:.1}%", "Time saved", self.time_saved_pct);
        println!();

        println!("{}", "RETRIEVE_MEMORIES".cyan().bold());
        for (label, stats) in [
            ("with cache", &self.with_cache.retrieve),
            ("without cache", &self.without_cache.retrieve),
        ] {
            println!(
                "{:<15} median {} | p90 {} | p95 {} | p99 {} | max {}",
                label,
                ms(stats.median),
                ms(stats.p90),
                ms(stats.p95),
                ms(stats.p99),
                ms(stats.max)
            );
        }
        println!("\n{}", rule);
    }
}

/// 有缓存运行使用的配置
fn cached_config(cache_size: usize, ttl: Duration) -> anyhow::Result<CacheConfig> {
    let config = CacheConfig::new(cache_size, ttl);
    config.validate().context("Invalid --cache-size")?;
    Ok(config)
}

async fn run_once(components: &Components, user: &str, queries: &[String], cache: CacheConfig) -> RunResult {
    let monitor = Arc::new(PerformanceMonitor::from_config(&components.config.performance));
    monitor.enable();
    let orchestrator = components.orchestrator_with(cache, monitor.clone());

    let mut total_secs = 0.0;
    for (i, query) in queries.iter().enumerate() {
        tracing::info!("Query {}/{}", i + 1, queries.len());
        let start = Instant::now();
        orchestrator.retrieve_memories(user, query).await;
        total_secs += start.elapsed().as_secs_f64();
    }

    RunResult {
        total_secs,
        avg_secs: if queries.is_empty() {
            0.0
        } else {
            total_secs / queries.len() as f64
        },
        cache: orchestrator.cache_stats(),
        retrieve: monitor.get_statistics(OP_RETRIEVE),
    }
}

pub async fn run(
    components: &Components,
    user: &str,
    options: BenchOptions,
    json: bool,
) -> anyhow::Result<()> {
    let queries = generate_queries(
        options.num_queries,
        options.repeat_factor,
        &mut rand::thread_rng(),
    );
    if queries.is_empty() {
        anyhow::bail!("--num-queries must be at least 1");
    }
    if !json {
        println!("Running benchmark with {} queries...", queries.len());
    }

    let ttl = components.config.cache.default_ttl;

    if !json {
        println!("\nRunning WITH cache...");
    }
    let cached = cached_config(options.cache_size, ttl)?;
    let with_cache = run_once(components, user, &queries, cached).await;

    if !json {
        println!("Running WITHOUT cache...");
    }
    let without_cache = run_once(components, user, &queries, CacheConfig::new(0, ttl)).await;

    let report = BenchReport::new(&queries, with_cache, without_cache);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}
