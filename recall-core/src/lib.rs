//! # Recall Core Library
//!
//! Core library for Recall, a conversational assistant backed by a per-user
//! long-term memory store.
//!
//! ## Architecture
//!
//! - **Cache**: LRU + TTL cache for memory retrieval results
//! - **Telemetry**: latency monitor with rolling percentiles and slow-operation alerts
//! - **Memory**: orchestration of cached retrieval, generation and persistence
//! - **AI**: chat message types and the completion backend
//! - **Config**: layered configuration (defaults, TOML file, environment)
//!
//! ## Request Flow
//!
//! ```text
//! user message
//!     │
//!     ▼
//! MemoryOrchestrator ──→ LruCache ──(miss)──→ MemoryBackend.search
//!     │
//!     ├──→ SystemPromptProvider
//!     ├──→ CompletionBackend.complete
//!     └──→ MemoryBackend.add ──(ok)──→ invalidate user's cache entries
//!
//! every public orchestrator call ──→ PerformanceMonitor
//! ```
//!
//! Components are constructed explicitly and shared through `Arc`; there is
//! no process-wide state.

// Error handling
pub mod error;

// Configuration
pub mod config;

// Retrieval cache
pub mod cache;

// Latency monitoring
pub mod telemetry;

// Chat messages and completion backend
pub mod ai;

// Memory orchestration and backends
pub mod memory;

// Test utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod test;

pub use ai::{ChatMessage, CompletionBackend, Role};
pub use cache::{CacheConfig, CacheStats, LruCache};
pub use config::{ConfigLoader, RecallConfig};
pub use error::{RecallError, Result};
pub use memory::{
    MemoryBackend, MemoryOrchestrator, MemoryRecord, OrchestratorConfig, ProcessedMessage,
};
pub use telemetry::{measure, PerformanceMonitor};
