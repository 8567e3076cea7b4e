//! 组件装配
//!
//! config → backends → cache → monitor → orchestrator，全部显式构造。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use recall_core::ai::{build_http_client, CompletionBackend, OpenAiCompletionBackend};
use recall_core::cache::{CacheConfig, LruCache};
use recall_core::config::{ConfigLoader, RecallConfig};
use recall_core::memory::{
    HttpMemoryBackend, MemoryBackend, MemoryCache, MemoryOrchestrator, StaticPromptProvider,
    SupabasePromptProvider, SystemPromptProvider,
};
use recall_core::telemetry::PerformanceMonitor;

/// 加载并验证配置
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RecallConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    tracing::debug!("Loading config from {}", loader.config_path().display());

    loader.load().context("Invalid configuration")
}

/// 已装配的组件
pub struct Components {
    pub config: RecallConfig,
    memory: Arc<dyn MemoryBackend>,
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<dyn SystemPromptProvider>,
}

impl Components {
    /// 根据配置构建后端，共享一个 HTTP 客户端
    pub fn build(config: RecallConfig) -> anyhow::Result<Self> {
        // 客户端超时只是上限，各后端按自身的 timeout_secs 设置单请求超时
        let timeout = config.llm.timeout_secs.max(config.memory_api.timeout_secs);
        let client = build_http_client(Duration::from_secs(timeout))?;

        let memory = HttpMemoryBackend::with_client(config.memory_api.clone(), client.clone())
            .context("Failed to create memory backend")?;
        let llm = OpenAiCompletionBackend::with_client(config.llm.clone(), client.clone())
            .context("Failed to create completion backend")?;

        let prompts: Arc<dyn SystemPromptProvider> = if config.prompt.has_supabase() {
            let url = config.prompt.supabase_url.clone().unwrap_or_default();
            let key = config.prompt.supabase_key.clone().unwrap_or_default();
            Arc::new(
                SupabasePromptProvider::with_client(url, key, client)
                    .context("Failed to create prompt provider")?,
            )
        } else {
            Arc::new(StaticPromptProvider::default_prompt())
        };

        tracing::info!("Using model {} via {}", llm.model(), llm.name());

        Ok(Self {
            config,
            memory: Arc::new(memory),
            llm: Arc::new(llm),
            prompts,
        })
    }

    /// 使用配置中的缓存设置创建编排器
    pub fn orchestrator(&self) -> MemoryOrchestrator {
        let monitor = Arc::new(PerformanceMonitor::from_config(&self.config.performance));
        self.orchestrator_with(self.config.cache.clone(), monitor)
    }

    /// 使用指定缓存配置和监控器创建编排器
    pub fn orchestrator_with(
        &self,
        cache_config: CacheConfig,
        monitor: Arc<PerformanceMonitor>,
    ) -> MemoryOrchestrator {
        let cache: Arc<MemoryCache> = Arc::new(LruCache::new(cache_config));

        MemoryOrchestrator::new(self.memory.clone(), self.llm.clone())
            .with_prompt_provider(self.prompts.clone())
            .with_cache(cache)
            .with_monitor(monitor)
            .with_config(self.config.memory.clone())
    }
}
