//! # Memory Module
//!
//! 长期记忆的访问层：后端接口、结果归一化、system prompt 来源，
//! 以及组合缓存检索、生成与持久化的 [`MemoryOrchestrator`]。
//!
//! ## 模块结构
//!
//! - `record`: 检索结果归一化
//! - `backend`: 记忆服务接口与持久化策略
//! - `http`: Mem0 兼容 REST 后端
//! - `prompt`: system prompt 来源
//! - `orchestrator`: 请求编排

pub mod backend;
pub mod http;
pub mod orchestrator;
pub mod prompt;
pub mod record;

pub use backend::{storable_turns, MemoryBackend, MemoryPayload, PersistStrategy, WriteMetadata};
pub use http::{HttpMemoryBackend, MemoryApiConfig};
pub use orchestrator::{
    build_prompt, render_memory_block, MemoryCache, MemoryOrchestrator, OrchestratorConfig,
    ProcessedMessage, OP_ADD, OP_CHAT, OP_CLEAR, OP_PROCESS, OP_RETRIEVE,
};
pub use prompt::{
    resolve_system_prompt, resolve_system_prompt_or, InMemoryPromptProvider, PromptConfig,
    StaticPromptProvider, SupabasePromptProvider, SystemPromptProvider, DEFAULT_SYSTEM_PROMPT,
};
pub use record::{MemoryRecord, SearchResponse};
