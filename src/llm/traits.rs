//! 模型推理协作者抽象
//!
//! 编排核心只依赖 ModelClient：输入（解析后的指令 + 派生历史 + 工具 schema + 可委派对象），
//! 输出（文本 / 工具调用 / 委派请求）。具体后端在核心之外实现。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::agent::DelegateCandidate;
use crate::session::ContextEntry;
use crate::tools::ToolSchema;

/// 推理协作者可能的失败（超时、输出格式错误、后端不可用）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Inference timeout")]
    Timeout,

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Inference backend unavailable: {0}")]
    Unavailable(String),
}

/// 一次推理请求
#[derive(Debug, Clone, Default, Serialize)]
pub struct InferenceRequest {
    /// 发起推理的 Agent 名
    pub agent: String,
    /// 已按当前状态解析的指令
    pub instruction: String,
    /// 从事件日志派生并截断的历史视图
    pub history: Vec<ContextEntry>,
    pub tools: Vec<ToolSchema>,
    pub delegates: Vec<DelegateCandidate>,
}

/// 模型请求的一次工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// 调用 ID；结果按 ID 而非到达顺序对应
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }
}

/// 模型输出：工具调用优先于委派，委派优先于文本
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    /// 委派目标或路由需求（自由文本，由 DelegationRouter 解析）
    pub delegate: Option<String>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        Self::tool_calls(vec![ToolCallRequest::new(name, args)])
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }

    pub fn delegate(target: impl Into<String>) -> Self {
        Self {
            delegate: Some(target.into()),
            ..Self::default()
        }
    }
}

/// 模型客户端 trait：单次推理
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn infer(&self, request: &InferenceRequest) -> Result<ModelResponse, LlmError>;
}

/// 模型调用重试配置：单次超时 + 有限次数的指数退避
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryConfig {
    /// 第 attempt 次失败后的退避时间（attempt 从 0 开始）
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let cfg = RetryConfig {
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(1),
        };
        assert_eq!(cfg.backoff_for(0), Duration::from_millis(100));
        assert_eq!(cfg.backoff_for(1), Duration::from_millis(200));
        assert_eq!(cfg.backoff_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_response_constructors() {
        let r = ModelResponse::tool_call("validate_return", serde_json::json!({"item_id": 42}));
        assert_eq!(r.tool_calls.len(), 1);
        assert!(r.tool_calls[0].id.starts_with("call_"));
        assert!(r.text.is_none());
        assert_eq!(ModelResponse::delegate("Returns").delegate.as_deref(), Some("Returns"));
    }
}
