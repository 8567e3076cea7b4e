//! # System Prompt Providers
//!
//! 按用户提供自定义 system prompt，缺失或出错时回退到默认值。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ai::build_http_client;
use crate::error::{RecallError, Result};

/// 默认 system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly and detail-oriented AI assistant.
Answer questions as helpfully as possible.
If you do not know the answer to a question, do not make anything up; just say that you do not know.
Base your answers on accurate facts and knowledge.";

/// 用户 system prompt 来源
#[async_trait]
pub trait SystemPromptProvider: Send + Sync {
    /// 获取用户的自定义 prompt，没有时返回 `Ok(None)`
    async fn get_prompt(&self, user_id: &str) -> Result<Option<String>>;
}

/// 解析用户的 system prompt
///
/// 缺失、空白或出错时返回 [`DEFAULT_SYSTEM_PROMPT`]，从不失败。
pub async fn resolve_system_prompt(provider: &dyn SystemPromptProvider, user_id: &str) -> String {
    resolve_system_prompt_or(provider, user_id, DEFAULT_SYSTEM_PROMPT).await
}

/// 同 [`resolve_system_prompt`]，使用指定的回退 prompt
pub async fn resolve_system_prompt_or(
    provider: &dyn SystemPromptProvider,
    user_id: &str,
    fallback: &str,
) -> String {
    match provider.get_prompt(user_id).await {
        Ok(Some(prompt)) if !prompt.trim().is_empty() => prompt,
        Ok(_) => fallback.to_string(),
        Err(e) => {
            tracing::warn!("Failed to load system prompt for user: {}", e);
            fallback.to_string()
        }
    }
}

/// 固定 prompt
pub struct StaticPromptProvider {
    prompt: Option<String>,
}

impl StaticPromptProvider {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
        }
    }

    /// 始终使用默认 prompt
    pub fn default_prompt() -> Self {
        Self { prompt: None }
    }
}

#[async_trait]
impl SystemPromptProvider for StaticPromptProvider {
    async fn get_prompt(&self, _user_id: &str) -> Result<Option<String>> {
        Ok(self.prompt.clone())
    }
}

/// 进程内按用户保存的 prompt
#[derive(Default)]
pub struct InMemoryPromptProvider {
    prompts: RwLock<HashMap<String, String>>,
}

impl InMemoryPromptProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置用户 prompt
    pub fn set_prompt(&self, user_id: impl Into<String>, prompt: impl Into<String>) {
        self.prompts.write().insert(user_id.into(), prompt.into());
    }

    /// 删除用户 prompt
    pub fn remove_prompt(&self, user_id: &str) -> bool {
        self.prompts.write().remove(user_id).is_some()
    }
}

#[async_trait]
impl SystemPromptProvider for InMemoryPromptProvider {
    async fn get_prompt(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.prompts.read().get(user_id).cloned())
    }
}

/// Supabase 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Supabase 地址 (SUPABASE_URL)
    pub supabase_url: Option<String>,
    /// Supabase anon/service key (SUPABASE_KEY)
    pub supabase_key: Option<String>,
}

impl PromptConfig {
    /// 是否配置了 Supabase
    pub fn has_supabase(&self) -> bool {
        matches!(
            (&self.supabase_url, &self.supabase_key),
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty()
        )
    }
}

#[derive(Debug, Deserialize)]
struct UserPromptRow {
    system_prompt: Option<String>,
}

/// 从 Supabase `user_prompts` 表读取 prompt
pub struct SupabasePromptProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabasePromptProvider {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(30))?;
        Self::with_client(url, api_key, client)
    }

    pub fn with_client(
        url: impl Into<String>,
        api_key: impl Into<String>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let base_url = url.into();
        let api_key = api_key.into();
        if base_url.trim().is_empty() || api_key.trim().is_empty() {
            return Err(RecallError::configuration(
                "SUPABASE_URL and SUPABASE_KEY must both be set",
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/user_prompts", self.base_url)
    }
}

fn first_prompt(rows: Vec<UserPromptRow>) -> Option<String> {
    rows.into_iter()
        .find_map(|r| r.system_prompt)
        .filter(|p| !p.trim().is_empty())
}

#[async_trait]
impl SystemPromptProvider for SupabasePromptProvider {
    async fn get_prompt(&self, user_id: &str) -> Result<Option<String>> {
        let user_filter = format!("eq.{}", user_id);
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("user_id", user_filter.as_str()), ("select", "system_prompt")])
            .header("apikey", self.api_key.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| {
                RecallError::backend_unavailable(format!("Prompt lookup failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecallError::backend_unavailable(format!(
                "Prompt lookup returned {}",
                status
            )));
        }

        let rows = response.json::<Vec<UserPromptRow>>().await?;
        Ok(first_prompt(rows))
    }
}
