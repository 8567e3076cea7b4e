//! # Memory Orchestrator
//!
//! 组合缓存检索、回复生成与记忆持久化。
//!
//! 每个请求依次经过 `RETRIEVE → GENERATE → PERSIST`：
//!
//! - RETRIEVE 失败时以空记忆继续
//! - GENERATE 失败时返回错误提示文本，`memories_used` 为空
//! - PERSIST 失败只记录日志，不影响已生成的回复
//!
//! 所有公开操作都以自身名称计时 (`retrieve_memories`、`add_memory`、
//! `clear_memories`、`chat_completion`、`process_message`)。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::{storable_turns, MemoryBackend, PersistStrategy, WriteMetadata};
use super::prompt::{
    resolve_system_prompt_or, StaticPromptProvider, SystemPromptProvider, DEFAULT_SYSTEM_PROMPT,
};
use super::record::MemoryRecord;
use crate::ai::{ChatMessage, CompletionBackend, Role};
use crate::cache::{CacheConfig, CacheKey, CacheStats, LruCache};
use crate::error::{RecallError, Result};
use crate::telemetry::{measure, PerformanceMonitor};

/// 检索结果缓存
pub type MemoryCache = LruCache<String, Vec<MemoryRecord>>;

pub const OP_RETRIEVE: &str = "retrieve_memories";
pub const OP_ADD: &str = "add_memory";
pub const OP_CLEAR: &str = "clear_memories";
pub const OP_CHAT: &str = "chat_completion";
pub const OP_PROCESS: &str = "process_message";

/// 默认检索条数
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 5;

/// 默认应用标签 (写入元数据 `app`)
pub const DEFAULT_APP_TAG: &str = "recall";

/// 记忆块前的指令行
pub const MEMORY_INSTRUCTION: &str =
    "Answer the user's question based on the available memories and the current query.";

/// 记忆块标题
pub const MEMORY_HEADER: &str = "User memories:";

const ERROR_RESPONSE: &str = "Sorry, an error occurred while processing your message";

const DEFAULT_CHAIN: [PersistStrategy; 1] = [PersistStrategy::Transcript];

/// 编排器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 每次检索的记忆条数
    pub retrieval_limit: usize,
    /// 持久化策略链，按顺序尝试
    pub persist_strategies: Vec<PersistStrategy>,
    /// 写入元数据中的应用标签
    pub app_tag: String,
    /// 用户没有自定义 prompt 时使用
    pub system_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            persist_strategies: DEFAULT_CHAIN.to_vec(),
            app_tag: DEFAULT_APP_TAG.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_retrieval_limit(mut self, limit: usize) -> Self {
        self.retrieval_limit = limit;
        self
    }

    pub fn with_persist_strategies(mut self, strategies: Vec<PersistStrategy>) -> Self {
        self.persist_strategies = strategies;
        self
    }

    pub fn with_app_tag(mut self, app_tag: impl Into<String>) -> Self {
        self.app_tag = app_tag.into();
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.retrieval_limit == 0 || self.retrieval_limit > 100 {
            return Err(RecallError::configuration(format!(
                "memory.retrieval_limit must be in 1..=100, got {}",
                self.retrieval_limit
            )));
        }
        if self.persist_strategies.is_empty() {
            return Err(RecallError::configuration(
                "memory.persist_strategies cannot be empty",
            ));
        }
        Ok(())
    }
}

/// `process_message` 的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    /// 助手回复
    pub response: String,
    /// 本次回复使用的记忆
    pub memories_used: Vec<MemoryRecord>,
}

impl ProcessedMessage {
    fn failed(detail: impl std::fmt::Display) -> Self {
        Self {
            response: format!("{}: {}", ERROR_RESPONSE, detail),
            memories_used: Vec::new(),
        }
    }

    /// 是否为错误回复
    pub fn is_error(&self) -> bool {
        self.response.starts_with(ERROR_RESPONSE)
    }
}

/// 记忆编排器
///
/// 所有组件显式注入，同一个缓存和监控器可以在多个编排器之间共享。
///
/// ## 示例
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use recall_core::ai::{ChatMessage, LlmConfig, OpenAiCompletionBackend};
/// use recall_core::memory::{HttpMemoryBackend, MemoryApiConfig, MemoryOrchestrator};
///
/// # async fn example() -> recall_core::Result<()> {
/// let memory = HttpMemoryBackend::new(MemoryApiConfig::default().with_url("http://localhost:8000"))?;
/// let llm = OpenAiCompletionBackend::new(LlmConfig::default().with_api_key("sk-..."))?;
///
/// let orchestrator = MemoryOrchestrator::new(Arc::new(memory), Arc::new(llm));
/// let result = orchestrator
///     .process_message(&[ChatMessage::user("What's my name?")], "user-1")
///     .await;
/// println!("{}", result.response);
/// # Ok(())
/// # }
/// ```
pub struct MemoryOrchestrator {
    memory: Arc<dyn MemoryBackend>,
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<dyn SystemPromptProvider>,
    cache: Arc<MemoryCache>,
    monitor: Arc<PerformanceMonitor>,
    config: OrchestratorConfig,
}

impl MemoryOrchestrator {
    /// 使用默认缓存、监控器和 prompt 创建编排器
    pub fn new(memory: Arc<dyn MemoryBackend>, llm: Arc<dyn CompletionBackend>) -> Self {
        Self {
            memory,
            llm,
            prompts: Arc::new(StaticPromptProvider::default_prompt()),
            cache: Arc::new(LruCache::new(CacheConfig::default())),
            monitor: Arc::new(PerformanceMonitor::default()),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_prompt_provider(mut self, prompts: Arc<dyn SystemPromptProvider>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_cache(mut self, cache: Arc<MemoryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// 缓存统计
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 检索相关记忆 (默认条数)
    pub async fn retrieve_memories(&self, user_id: &str, query: &str) -> Vec<MemoryRecord> {
        self.retrieve_memories_with_limit(user_id, query, self.config.retrieval_limit)
            .await
    }

    /// 检索相关记忆
    ///
    /// 先查缓存；未命中时调用记忆服务并缓存归一化后的结果。
    /// 后端出错时返回空列表。
    pub async fn retrieve_memories_with_limit(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Vec<MemoryRecord> {
        measure(&self.monitor, OP_RETRIEVE, self.retrieve_inner(user_id, query, limit)).await
    }

    async fn retrieve_inner(&self, user_id: &str, query: &str, limit: usize) -> Vec<MemoryRecord> {
        if user_id.trim().is_empty() {
            tracing::warn!("{}", RecallError::malformed_input("empty user_id for retrieval"));
            return Vec::new();
        }
        if limit == 0 {
            return Vec::new();
        }

        let key = CacheKey::memories(user_id, query, limit);
        if let Some(records) = self.cache.get(&key) {
            tracing::debug!("Memory cache hit ({} records)", records.len());
            return records;
        }

        match self.memory.search(query, user_id, limit).await {
            Ok(response) => {
                let records = response.into_records();
                tracing::debug!(
                    "Retrieved {} memories from {}",
                    records.len(),
                    self.memory.name()
                );
                self.cache.set(key, records.clone());
                records
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("Memory search failed, continuing without memories: {}", e);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Memory search misconfigured: {}", e);
                Vec::new()
            }
        }
    }

    /// 持久化对话
    ///
    /// 没有可存内容时直接返回 `true`。成功后使该用户的全部检索缓存失效。
    pub async fn add_memory(&self, messages: &[ChatMessage], user_id: &str) -> bool {
        measure(&self.monitor, OP_ADD, self.add_inner(messages, user_id)).await
    }

    async fn add_inner(&self, messages: &[ChatMessage], user_id: &str) -> bool {
        if storable_turns(messages).next().is_none() {
            tracing::debug!("Nothing to store for add_memory");
            return true;
        }
        if user_id.trim().is_empty() {
            tracing::warn!("{}", RecallError::malformed_input("empty user_id for add_memory"));
            return false;
        }

        let mut metadata = WriteMetadata::new();
        metadata.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());
        metadata.insert("app".to_string(), self.config.app_tag.clone());

        for strategy in self.strategies() {
            let Some(payload) = strategy.build_payload(messages) else {
                continue;
            };

            let mut write_metadata = metadata.clone();
            write_metadata.insert("strategy".to_string(), strategy.to_string());

            match self.memory.add(payload, user_id, write_metadata).await {
                Ok(id) => {
                    let removed = self.invalidate_user(user_id);
                    tracing::info!(
                        "Memory stored via {} (id={}, invalidated {} cache entries)",
                        strategy,
                        id,
                        removed
                    );
                    return true;
                }
                Err(e) => {
                    tracing::warn!("Persist strategy {} failed: {}", strategy, e);
                }
            }
        }

        tracing::error!("All persist strategies failed, memory not stored");
        false
    }

    /// 删除用户全部记忆
    ///
    /// 仅在后端成功时使该用户的缓存失效。
    pub async fn clear_memories(&self, user_id: &str) -> bool {
        measure(&self.monitor, OP_CLEAR, self.clear_inner(user_id)).await
    }

    async fn clear_inner(&self, user_id: &str) -> bool {
        if user_id.trim().is_empty() {
            tracing::warn!("{}", RecallError::malformed_input("empty user_id for clear_memories"));
            return false;
        }

        match self.memory.delete_all(user_id).await {
            Ok(()) => {
                let removed = self.invalidate_user(user_id);
                tracing::info!("Cleared memories (invalidated {} cache entries)", removed);
                true
            }
            Err(e) => {
                tracing::error!("Failed to clear memories: {}", e);
                false
            }
        }
    }

    /// 调用语言模型
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String> {
        measure(&self.monitor, OP_CHAT, async {
            if messages.is_empty() {
                return Err(RecallError::malformed_input("no messages for completion"));
            }
            self.llm.complete(messages).await
        })
        .await
    }

    /// 处理一条用户消息
    ///
    /// `history` 为按时间排序的完整对话，最后一条 user 消息作为检索查询。
    /// 持久化时只写入该消息和本次回复。
    pub async fn process_message(&self, history: &[ChatMessage], user_id: &str) -> ProcessedMessage {
        measure(&self.monitor, OP_PROCESS, self.process_inner(history, user_id)).await
    }

    async fn process_inner(&self, history: &[ChatMessage], user_id: &str) -> ProcessedMessage {
        let Some(query) = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User && !m.is_blank())
        else {
            return ProcessedMessage::failed(RecallError::malformed_input("no user message"));
        };

        let memories = self.retrieve_memories(user_id, &query.content).await;
        let system =
            resolve_system_prompt_or(self.prompts.as_ref(), user_id, &self.config.system_prompt)
                .await;
        let prompt = build_prompt(&system, &memories, history);

        let response = match self.chat_completion(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Completion failed: {}", e);
                return ProcessedMessage::failed(e);
            }
        };

        // 只写入本轮，之前的轮次在各自处理时已经写入
        let exchange = [query.clone(), ChatMessage::assistant(response.clone())];
        if !self.add_memory(&exchange, user_id).await {
            tracing::warn!("Exchange not persisted; response returned anyway");
        }

        ProcessedMessage {
            response,
            memories_used: memories,
        }
    }

    fn strategies(&self) -> &[PersistStrategy] {
        if self.config.persist_strategies.is_empty() {
            &DEFAULT_CHAIN
        } else {
            &self.config.persist_strategies
        }
    }

    fn invalidate_user(&self, user_id: &str) -> usize {
        self.cache.invalidate_prefix(&CacheKey::user_prefix(user_id))
    }
}

/// 渲染记忆块，没有记忆时返回 `None`
pub fn render_memory_block(memories: &[MemoryRecord]) -> Option<String> {
    if memories.is_empty() {
        return None;
    }

    let mut block = format!("{}\n{}", MEMORY_INSTRUCTION, MEMORY_HEADER);
    for memory in memories {
        block.push_str("\n- ");
        block.push_str(&memory.text);
    }
    Some(block)
}

/// 构建补全请求: system (含记忆块) + 对话历史
///
/// 历史中的 system 消息被合成后的 system 消息取代。
pub fn build_prompt(
    system: &str,
    memories: &[MemoryRecord],
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let system_content = match render_memory_block(memories) {
        Some(block) => format!("{}\n\n{}", system, block),
        None => system.to_string(),
    };

    std::iter::once(ChatMessage::system(system_content))
        .chain(history.iter().filter(|m| m.role != Role::System).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::mocks::{MockCompletionBackend, MockMemoryBackend};

    fn orchestrator(
        memory: &MockMemoryBackend,
        llm: &MockCompletionBackend,
    ) -> MemoryOrchestrator {
        MemoryOrchestrator::new(Arc::new(memory.clone()), Arc::new(llm.clone()))
    }

    #[test]
    fn test_render_memory_block() {
        assert_eq!(render_memory_block(&[]), None);

        let memories = [MemoryRecord::new("Likes tea"), MemoryRecord::new("Lives in Lisbon")];
        let block = render_memory_block(&memories).unwrap();
        assert_eq!(
            block,
            "Answer the user's question based on the available memories and the current query.\n\
             User memories:\n- Likes tea\n- Lives in Lisbon"
        );
    }

    #[test]
    fn test_build_prompt_layout() {
        let history = vec![
            ChatMessage::system("old system"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("what do I drink?"),
        ];

        let prompt = build_prompt("SYS", &[MemoryRecord::new("Likes tea")], &history);
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.starts_with("SYS\n\n"));
        assert!(prompt[0].content.ends_with("- Likes tea"));
        assert_eq!(prompt[3].content, "what do I drink?");

        let bare = build_prompt("SYS", &[], &history);
        assert_eq!(bare[0].content, "SYS");
    }

    #[test]
    fn test_config_validate() {
        assert!(OrchestratorConfig::default().validate().is_ok());
        assert!(OrchestratorConfig::default()
            .with_retrieval_limit(0)
            .validate()
            .is_err());
        assert!(OrchestratorConfig::default()
            .with_persist_strategies(vec![])
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_retrieve_uses_cache() {
        let memory = MockMemoryBackend::new();
        memory.preset_records("u1", vec![MemoryRecord::new("Likes tea")]);
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        let first = orch.retrieve_memories("u1", "drinks").await;
        let second = orch.retrieve_memories("u1", "drinks").await;

        assert_eq!(first, second);
        assert_eq!(memory.search_calls(), 1);
        assert_eq!(orch.cache_stats().hits, 1);
        assert_eq!(orch.monitor().get_metrics(OP_RETRIEVE).count, 2);
    }

    #[tokio::test]
    async fn test_add_memory_nothing_to_store() {
        let memory = MockMemoryBackend::new();
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        assert!(orch.add_memory(&[], "u1").await);
        assert!(orch.add_memory(&[ChatMessage::system("x")], "u1").await);
        assert_eq!(memory.add_calls(), 0);
    }

    #[tokio::test]
    async fn test_add_memory_rejects_blank_user() {
        let memory = MockMemoryBackend::new();
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        assert!(!orch.add_memory(&[ChatMessage::user("hi")], " ").await);
        assert_eq!(memory.add_calls(), 0);
    }

    #[tokio::test]
    async fn test_add_memory_writes_metadata() {
        let memory = MockMemoryBackend::new();
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm)
            .with_config(OrchestratorConfig::default().with_app_tag("test-app"));

        assert!(orch.add_memory(&[ChatMessage::user("My name is Ana")], "u1").await);

        let writes = memory.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].user_id, "u1");
        assert_eq!(writes[0].metadata.get("app").map(String::as_str), Some("test-app"));
        assert_eq!(writes[0].metadata.get("strategy").map(String::as_str), Some("transcript"));
        assert!(writes[0].metadata.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_fallback_chain_first_success_wins() {
        let memory = MockMemoryBackend::new();
        memory.fail_next_adds(1);
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm).with_config(
            OrchestratorConfig::default().with_persist_strategies(vec![
                PersistStrategy::Transcript,
                PersistStrategy::Messages,
                PersistStrategy::PlainText,
            ]),
        );

        assert!(orch.add_memory(&[ChatMessage::user("hello")], "u1").await);
        assert_eq!(memory.add_calls(), 2);

        let writes = memory.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].metadata.get("strategy").map(String::as_str), Some("messages"));
    }

    #[tokio::test]
    async fn test_chat_completion_rejects_empty() {
        let memory = MockMemoryBackend::new();
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        let err = orch.chat_completion(&[]).await.unwrap_err();
        assert!(matches!(err, RecallError::MalformedInput(_)));
        assert_eq!(llm.calls(), 0);
        assert_eq!(orch.monitor().get_metrics(OP_CHAT).count, 1);
    }

    #[tokio::test]
    async fn test_process_without_user_turn() {
        let memory = MockMemoryBackend::new();
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        let result = orch
            .process_message(&[ChatMessage::assistant("hello")], "u1")
            .await;
        assert!(result.is_error());
        assert!(result.memories_used.is_empty());
        assert_eq!(memory.search_calls(), 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_process_message_prompt_and_persist() {
        let memory = MockMemoryBackend::new();
        memory.preset_raw_response(serde_json::json!({
            "results": [{"id": "m1", "memory": "Likes tea", "score": 0.91}]
        }));
        let llm = MockCompletionBackend::new();
        llm.preset_response("What do I drink?", "You like tea.");
        let orch = orchestrator(&memory, &llm);

        let result = orch
            .process_message(&[ChatMessage::user("What do I drink?")], "u1")
            .await;

        assert_eq!(result.response, "You like tea.");
        assert_eq!(result.memories_used.len(), 1);
        assert_eq!(result.memories_used[0].score, Some(0.91));

        let request = llm.last_request().unwrap();
        assert_eq!(request[0].role, Role::System);
        assert!(request[0].content.contains(MEMORY_HEADER));
        assert!(request[0].content.contains("- Likes tea"));

        let stored = memory.stored("u1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "USER: What do I drink?\nASSISTANT: You like tea.");
    }

    #[tokio::test]
    async fn test_recovery_after_backend_outage() {
        let memory = MockMemoryBackend::new();
        memory.fail_search("connection refused");
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        assert!(orch.retrieve_memories("u1", "q").await.is_empty());
        assert!(orch.cache().is_empty());

        memory.recover();
        memory.preset_records("u1", vec![MemoryRecord::new("back online")]);
        let records = orch.retrieve_memories("u1", "q").await;
        assert_eq!(records, vec![MemoryRecord::new("back online")]);
        assert_eq!(memory.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_cached_retrieval_skips_backend() {
        let memory = MockMemoryBackend::with_latency(30);
        let llm = MockCompletionBackend::new();
        let orch = orchestrator(&memory, &llm);

        orch.retrieve_memories("u1", "q").await;
        orch.retrieve_memories("u1", "q").await;

        assert_eq!(memory.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_process_message_persists_only_latest_turn() {
        let memory = MockMemoryBackend::new();
        let llm = MockCompletionBackend::new();
        llm.set_default_response("R3");
        let orch = orchestrator(&memory, &llm);

        let history = vec![
            ChatMessage::user("turn one"),
            ChatMessage::assistant("R1"),
            ChatMessage::user("turn two"),
            ChatMessage::assistant("R2"),
            ChatMessage::user("turn three"),
        ];
        let result = orch.process_message(&history, "u1").await;
        assert_eq!(result.response, "R3");

        // the prompt still carries the whole session
        let request = llm.last_request().unwrap();
        assert_eq!(request.len(), history.len() + 1);

        let stored = memory.stored("u1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "USER: turn three\nASSISTANT: R3");
    }
}
