//! # Mock Implementations
//!
//! 后端接口的 Mock 实现，用于隔离测试编排逻辑。
//!
//! - `MockMemoryBackend`: 记忆服务 Mock
//! - `MockCompletionBackend`: 语言模型 Mock

mod completion;
mod memory_backend;

pub use completion::MockCompletionBackend;
pub use memory_backend::{MockMemoryBackend, RecordedWrite};
