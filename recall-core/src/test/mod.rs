//! # Test Support
//!
//! Mock 实现与测试工具。
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use recall_core::memory::MemoryOrchestrator;
//! use recall_core::test::mocks::{MockCompletionBackend, MockMemoryBackend};
//!
//! let memory = MockMemoryBackend::new();
//! let llm = MockCompletionBackend::new();
//! llm.will_fail("rate limited");
//!
//! let orchestrator = MemoryOrchestrator::new(Arc::new(memory.clone()), Arc::new(llm));
//! ```

pub mod mocks;
