//! # Memory Backend
//!
//! 向量记忆服务的抽象接口，以及写入时使用的载荷与持久化策略。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::record::SearchResponse;
use crate::ai::{ChatMessage, Role};
use crate::error::Result;

/// 写入时附带的元数据
pub type WriteMetadata = BTreeMap<String, String>;

/// 写入记忆服务的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MemoryPayload {
    /// 单个文本块
    Text(String),
    /// 结构化消息列表
    Messages(Vec<ChatMessage>),
}

impl MemoryPayload {
    /// 转换为消息列表 (文本作为单条 user 消息)
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            MemoryPayload::Text(text) => vec![ChatMessage::user(text)],
            MemoryPayload::Messages(messages) => messages,
        }
    }
}

/// 向量记忆服务接口
///
/// ## 实现者
///
/// - `HttpMemoryBackend`: Mem0 兼容 REST API
/// - `MockMemoryBackend`: 测试用 (test-utils)
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &str;

    /// 相似度检索，返回未归一化的原始响应
    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<SearchResponse>;

    /// 写入记忆，返回后端给出的标识
    async fn add(
        &self,
        payload: MemoryPayload,
        user_id: &str,
        metadata: WriteMetadata,
    ) -> Result<String>;

    /// 删除用户的全部记忆
    async fn delete_all(&self, user_id: &str) -> Result<()>;
}

/// 持久化策略
///
/// 按顺序尝试，每个策略相互独立，第一个成功即停止。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistStrategy {
    /// 每行 `ROLE: content` 的对话文本块
    Transcript,
    /// 结构化消息列表
    Messages,
    /// 内容以空格拼接
    PlainText,
}

impl PersistStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistStrategy::Transcript => "transcript",
            PersistStrategy::Messages => "messages",
            PersistStrategy::PlainText => "plain_text",
        }
    }

    /// 根据策略构建载荷
    ///
    /// 只保留非 system 且内容非空白的消息；没有可存内容时返回 `None`。
    pub fn build_payload(&self, messages: &[ChatMessage]) -> Option<MemoryPayload> {
        let turns: Vec<&ChatMessage> = storable_turns(messages).collect();
        if turns.is_empty() {
            return None;
        }

        let payload = match self {
            PersistStrategy::Transcript => MemoryPayload::Text(
                turns
                    .iter()
                    .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content.trim()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            PersistStrategy::Messages => {
                MemoryPayload::Messages(turns.into_iter().cloned().collect())
            }
            PersistStrategy::PlainText => MemoryPayload::Text(
                turns
                    .iter()
                    .map(|m| m.content.trim())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        };
        Some(payload)
    }
}

impl std::fmt::Display for PersistStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可写入记忆的消息 (非 system，内容非空白)
pub fn storable_turns(messages: &[ChatMessage]) -> impl Iterator<Item = &ChatMessage> {
    messages
        .iter()
        .filter(|m| m.role != Role::System && !m.is_blank())
}
