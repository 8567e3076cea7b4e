//! # Mock Memory Backend
//!
//! 记忆服务的 Mock 实现：按用户保存写入内容，记录调用次数，支持失败注入。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{RecallError, Result};
use crate::memory::{MemoryBackend, MemoryPayload, MemoryRecord, SearchResponse, WriteMetadata};

/// 一次成功的写入
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub user_id: String,
    pub payload: MemoryPayload,
    pub metadata: WriteMetadata,
}

/// 记忆后端 Mock
#[derive(Clone, Default)]
pub struct MockMemoryBackend {
    records: Arc<Mutex<HashMap<String, Vec<MemoryRecord>>>>,
    raw_response: Arc<Mutex<Option<Value>>>,
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    search_calls: Arc<AtomicUsize>,
    add_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
    fail_search: Arc<Mutex<Option<String>>>,
    fail_add: Arc<Mutex<Option<String>>>,
    fail_delete: Arc<Mutex<Option<String>>>,
    failing_adds: Arc<AtomicUsize>,
    latency_ms: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockMemoryBackend")
            .field("search_calls", &self.search_calls())
            .field("add_calls", &self.add_calls())
            .field("delete_calls", &self.delete_calls())
            .finish()
    }
}

impl MockMemoryBackend {
    /// 创建新的 Mock
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建有延迟的 Mock
    pub fn with_latency(ms: u64) -> Self {
        let backend = Self::new();
        backend.latency_ms.store(ms as usize, Ordering::SeqCst);
        backend
    }

    /// 预设用户已有的记忆
    pub fn preset_records(&self, user_id: impl Into<String>, records: Vec<MemoryRecord>) {
        self.records.lock().insert(user_id.into(), records);
    }

    /// 预设原始检索响应 (覆盖所有用户)
    pub fn preset_raw_response(&self, value: Value) {
        *self.raw_response.lock() = Some(value);
    }

    /// 检索持续失败
    pub fn fail_search(&self, message: impl Into<String>) {
        *self.fail_search.lock() = Some(message.into());
    }

    /// 写入持续失败
    pub fn fail_add(&self, message: impl Into<String>) {
        *self.fail_add.lock() = Some(message.into());
    }

    /// 删除持续失败
    pub fn fail_delete(&self, message: impl Into<String>) {
        *self.fail_delete.lock() = Some(message.into());
    }

    /// 接下来 `n` 次写入失败
    pub fn fail_next_adds(&self, n: usize) {
        self.failing_adds.store(n, Ordering::SeqCst);
    }

    /// 清除所有失败注入
    pub fn recover(&self) {
        *self.fail_search.lock() = None;
        *self.fail_add.lock() = None;
        *self.fail_delete.lock() = None;
        self.failing_adds.store(0, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// 成功写入的记录
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    /// 用户当前保存的记忆
    pub fn stored(&self, user_id: &str) -> Vec<MemoryRecord> {
        self.records.lock().get(user_id).cloned().unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        let latency = self.latency_ms.load(Ordering::SeqCst) as u64;
        if latency > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency)).await;
        }
    }

    fn take_add_failure(&self) -> Option<String> {
        if let Some(message) = self.fail_add.lock().clone() {
            return Some(message);
        }
        self.failing_adds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| "injected add failure".to_string())
    }
}

fn payload_text(payload: &MemoryPayload) -> String {
    match payload {
        MemoryPayload::Text(text) => text.clone(),
        MemoryPayload::Messages(messages) => messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

#[async_trait]
impl MemoryBackend for MockMemoryBackend {
    fn name(&self) -> &str {
        "mock-memory"
    }

    async fn search(&self, _query: &str, user_id: &str, limit: usize) -> Result<SearchResponse> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(message) = self.fail_search.lock().clone() {
            return Err(RecallError::backend_unavailable(message));
        }
        if let Some(raw) = self.raw_response.lock().clone() {
            return Ok(SearchResponse::from_value(raw));
        }

        let results = self
            .stored(user_id)
            .into_iter()
            .take(limit)
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        Ok(SearchResponse::Wrapped { results })
    }

    async fn add(
        &self,
        payload: MemoryPayload,
        user_id: &str,
        metadata: WriteMetadata,
    ) -> Result<String> {
        let call = self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(message) = self.take_add_failure() {
            return Err(RecallError::backend_unavailable(message));
        }

        let id = format!("mem-{}", call + 1);
        let record = MemoryRecord::new(payload_text(&payload)).with_id(id.clone());
        self.records
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .push(record);
        self.writes.lock().push(RecordedWrite {
            user_id: user_id.to_string(),
            payload,
            metadata,
        });
        Ok(id)
    }

    async fn delete_all(&self, user_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(message) = self.fail_delete.lock().clone() {
            return Err(RecallError::backend_unavailable(message));
        }
        self.records.lock().remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_then_search() {
        let backend = MockMemoryBackend::new();
        backend
            .add(MemoryPayload::Text("USER: hi".into()), "u1", WriteMetadata::new())
            .await
            .unwrap();

        let records = backend.search("hi", "u1", 5).await.unwrap().into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "USER: hi");
        assert!(backend.search("hi", "u2", 5).await.unwrap().into_records().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_adds_counts_down() {
        let backend = MockMemoryBackend::new();
        backend.fail_next_adds(2);

        for _ in 0..2 {
            assert!(backend
                .add(MemoryPayload::Text("x".into()), "u1", WriteMetadata::new())
                .await
                .is_err());
        }
        assert!(backend
            .add(MemoryPayload::Text("x".into()), "u1", WriteMetadata::new())
            .await
            .is_ok());
        assert_eq!(backend.add_calls(), 3);
    }
}
