//! # HTTP Memory Backend
//!
//! Mem0 兼容的 REST 记忆服务客户端。
//!
//! | 操作 | 请求 |
//! |------|------|
//! | search | `POST {url}/v1/memories/search/` |
//! | add | `POST {url}/v1/memories/` |
//! | delete_all | `DELETE {url}/v1/memories/?user_id=` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::{MemoryBackend, MemoryPayload, WriteMetadata};
use super::record::SearchResponse;
use crate::ai::{build_http_client, ChatMessage};
use crate::error::{RecallError, Result};

/// 默认集合前缀
pub const DEFAULT_COLLECTION_PREFIX: &str = "recall";

/// 记忆服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryApiConfig {
    /// 服务地址 (MEMORY_API_URL)
    pub url: Option<String>,
    /// API key (MEMORY_API_KEY)，以 `Token` 方式发送
    pub api_key: Option<String>,
    /// 集合前缀 (MEMORY_COLLECTION_PREFIX)，作为 `app_id` 发送
    pub collection_prefix: String,
    /// 请求超时 (秒)
    pub timeout_secs: u64,
}

impl Default for MemoryApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection_prefix: DEFAULT_COLLECTION_PREFIX.to_string(),
            timeout_secs: 30,
        }
    }
}

impl MemoryApiConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        match &self.url {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
            Some(url) => {
                return Err(RecallError::configuration(format!(
                    "MEMORY_API_URL must be an http(s) URL, got '{}'",
                    url
                )))
            }
            None => return Err(RecallError::configuration("MEMORY_API_URL not set")),
        }
        if self.timeout_secs == 0 {
            return Err(RecallError::configuration("memory_api timeout_secs must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    user_id: &'a str,
    limit: usize,
    #[serde(skip_serializing_if = "str::is_empty")]
    app_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    messages: Vec<ChatMessage>,
    user_id: &'a str,
    metadata: WriteMetadata,
    #[serde(skip_serializing_if = "str::is_empty")]
    app_id: &'a str,
}

/// Mem0 兼容的 HTTP 记忆后端
pub struct HttpMemoryBackend {
    base_url: String,
    api_key: Option<String>,
    app_id: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpMemoryBackend {
    /// 使用配置创建后端，缺少 URL 时失败
    pub fn new(config: MemoryApiConfig) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.timeout_secs.max(1)))?;
        Self::with_client(config, client)
    }

    /// 使用共享 HTTP 客户端创建后端
    pub fn with_client(config: MemoryApiConfig, client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        let base_url = config
            .url
            .ok_or_else(|| RecallError::configuration("MEMORY_API_URL not set"))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            app_id: config.collection_prefix,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 附加认证头和本后端的超时，共享客户端的超时可能更长
    fn prepare(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Token {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, op: &str) -> Result<Value> {
        let response = self
            .prepare(request)
            .send()
            .await
            .map_err(|e| RecallError::backend_unavailable(format!("Memory {} failed: {}", op, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecallError::memory(format!(
                "Memory {} returned {}: {}",
                op, status, error_text
            )));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// 从写入响应中取出第一个记忆标识
fn extract_write_id(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => match map.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => map.get("results").and_then(extract_write_id),
        },
        Value::Array(items) => items.iter().find_map(extract_write_id),
        _ => None,
    }
}

#[async_trait]
impl MemoryBackend for HttpMemoryBackend {
    fn name(&self) -> &str {
        "mem0-http"
    }

    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<SearchResponse> {
        let body = SearchRequest {
            query,
            user_id,
            limit,
            app_id: &self.app_id,
        };
        let request = self.client.post(self.url("/v1/memories/search/")).json(&body);
        let value = self.send(request, "search").await?;
        Ok(SearchResponse::from_value(value))
    }

    async fn add(
        &self,
        payload: MemoryPayload,
        user_id: &str,
        metadata: WriteMetadata,
    ) -> Result<String> {
        let body = AddRequest {
            messages: payload.into_messages(),
            user_id,
            metadata,
            app_id: &self.app_id,
        };
        let request = self.client.post(self.url("/v1/memories/")).json(&body);
        let value = self.send(request, "add").await?;

        Ok(extract_write_id(&value).unwrap_or_else(|| "accepted".to_string()))
    }

    async fn delete_all(&self, user_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url("/v1/memories/"))
            .query(&[("user_id", user_id)]);
        self.send(request, "delete").await?;
        Ok(())
    }
}
