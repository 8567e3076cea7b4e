//! OpenAI 兼容的 Chat Completions 后端

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_http_client, ChatMessage, CompletionBackend};
use crate::error::{RecallError, Result};

/// 默认 API 地址
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// 默认模型
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 语言模型配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key (OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// API 地址 (OPENAI_BASE_URL)
    pub base_url: String,
    /// 模型名称 (MODEL_CHOICE)
    pub model: String,
    /// 请求超时 (秒)
    pub timeout_secs: u64,
    /// 采样温度，不设置时使用服务端默认值
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
            temperature: None,
        }
    }
}

impl LlmConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(RecallError::configuration("OPENAI_API_KEY not set")),
        }
        if self.base_url.trim().is_empty() {
            return Err(RecallError::configuration("LLM base_url cannot be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(RecallError::configuration("LLM model cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(RecallError::configuration("LLM timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// OpenAI Chat Completions 后端
pub struct OpenAiCompletionBackend {
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletionBackend {
    /// 使用配置创建后端，缺少 API key 时失败
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.timeout_secs.max(1)))?;
        Self::with_client(config, client)
    }

    /// 使用共享 HTTP 客户端创建后端
    pub fn with_client(config: LlmConfig, client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        let api_key = config
            .api_key
            .ok_or_else(|| RecallError::configuration("OPENAI_API_KEY not set"))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request(&self, messages: &[ChatMessage]) -> reqwest::RequestBuilder {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        self.client
            .post(self.endpoint())
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
    }
}

fn first_choice(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| RecallError::ai("No completion choice in response"))
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .request(messages)
            .send()
            .await
            .map_err(|e| {
                RecallError::backend_unavailable(format!("Completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecallError::ai(format!(
                "Completion API error ({}): {}",
                status, error_text
            )));
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| RecallError::ai(format!("Failed to parse completion response: {}", e)))?;

        first_choice(parsed)
    }
}
