//! # AI 模块
//!
//! 对话消息类型与语言模型补全接口。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use recall_core::ai::{ChatMessage, CompletionBackend, LlmConfig, OpenAiCompletionBackend};
//!
//! # async fn example() -> recall_core::Result<()> {
//! let backend = OpenAiCompletionBackend::new(LlmConfig::default().with_api_key("sk-..."))?;
//!
//! let reply = backend
//!     .complete(&[
//!         ChatMessage::system("You are a helpful assistant."),
//!         ChatMessage::user("What is Rust?"),
//!     ])
//!     .await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RecallError, Result};

mod openai;

pub use openai::{LlmConfig, OpenAiCompletionBackend};

/// 默认 HTTP 请求超时
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// 内容是否为空白
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// 语言模型补全接口
///
/// 接收完整的消息列表 (含 system 消息)，返回助手回复文本。
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &str;

    /// 生成一条回复
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// 构建共享 HTTP 客户端
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RecallError::configuration(format!("Failed to build HTTP client: {}", e)))
}
