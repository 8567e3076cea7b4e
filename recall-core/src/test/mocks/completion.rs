//! # Mock Completion Backend
//!
//! 语言模型的 Mock 实现，用于测试生成相关流程。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ai::{ChatMessage, CompletionBackend, Role};
use crate::error::{RecallError, Result};

/// 补全后端 Mock
#[derive(Clone)]
pub struct MockCompletionBackend {
    default_response: Arc<Mutex<String>>,
    responses: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    calls: Arc<AtomicUsize>,
    should_fail: Arc<Mutex<Option<String>>>,
}

impl MockCompletionBackend {
    /// 创建新的 Mock
    pub fn new() -> Self {
        Self {
            default_response: Arc::new(Mutex::new("Mock AI Response".to_string())),
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            should_fail: Arc::new(Mutex::new(None)),
        }
    }

    /// 设置默认响应
    pub fn set_default_response(&self, response: impl Into<String>) {
        *self.default_response.lock() = response.into();
    }

    /// 按最后一条 user 消息预设响应
    pub fn preset_response(&self, user_message: impl Into<String>, response: impl Into<String>) {
        self.responses.lock().insert(user_message.into(), response.into());
    }

    /// 设置调用失败
    pub fn will_fail(&self, message: impl Into<String>) {
        *self.should_fail.lock() = Some(message.into());
    }

    /// 清除失败设置
    pub fn recover(&self) {
        *self.should_fail.lock() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 最近一次请求的消息
    pub fn last_request(&self) -> Option<Vec<ChatMessage>> {
        self.requests.lock().last().cloned()
    }
}

impl Default for MockCompletionBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    fn name(&self) -> &str {
        "mock-llm"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(messages.to_vec());

        if let Some(message) = self.should_fail.lock().clone() {
            return Err(RecallError::ai(message));
        }

        let preset = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| self.responses.lock().get(&m.content).cloned());

        Ok(preset.unwrap_or_else(|| self.default_response.lock().clone()))
    }
}
