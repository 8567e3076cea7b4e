//! # Memory Records
//!
//! 记忆服务返回的结果形状并不统一：可能是裸列表，也可能包在 `results` 里；
//! 文本字段可能叫 `memory`、`text` 或 `content`，相关度可能叫 `score` 或
//! `similarity`。这里在收到响应时立即归一化为 [`MemoryRecord`]。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 文本字段候选 (按优先级)
const TEXT_FIELDS: [&str; 3] = ["memory", "text", "content"];

/// 相关度字段候选 (按优先级)
const SCORE_FIELDS: [&str; 2] = ["score", "similarity"];

/// 一条检索到的记忆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// 后端分配的标识，可能缺失
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 记忆文本
    pub text: String,
    /// 相关度分数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            score: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// 从任意 JSON 值解析一条记录
    ///
    /// 字符串直接作为文本；对象按字段候选取值；没有文本的记录返回 `None`。
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self::new(s.clone())),
            Value::Object(map) => {
                let text = TEXT_FIELDS
                    .iter()
                    .find_map(|f| {
                        map.get(*f)
                            .and_then(Value::as_str)
                            .filter(|s| !s.trim().is_empty())
                    })?;

                let score = SCORE_FIELDS
                    .iter()
                    .find_map(|f| map.get(*f).and_then(Value::as_f64));

                let id = map.get("id").and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });

                Some(Self {
                    id,
                    text: text.to_string(),
                    score,
                })
            }
            _ => None,
        }
    }
}

/// 记忆检索的原始响应
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    /// `{"results": [...]}`
    Wrapped { results: Vec<Value> },
    /// `[...]`
    List(Vec<Value>),
}

impl SearchResponse {
    /// 从 JSON 值解析，无法识别的形状视为空结果
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!("Unrecognized search response shape: {}", e);
            SearchResponse::List(Vec::new())
        })
    }

    /// 归一化为记录列表，丢弃无文本的条目
    pub fn into_records(self) -> Vec<MemoryRecord> {
        let raw = match self {
            SearchResponse::Wrapped { results } => results,
            SearchResponse::List(items) => items,
        };

        let total = raw.len();
        let records: Vec<MemoryRecord> = raw.iter().filter_map(MemoryRecord::from_value).collect();
        if records.len() < total {
            tracing::debug!(
                "Dropped {} memory records without text",
                total - records.len()
            );
        }
        records
    }
}

impl From<Vec<MemoryRecord>> for SearchResponse {
    fn from(records: Vec<MemoryRecord>) -> Self {
        SearchResponse::List(
            records
                .into_iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        )
    }
}
