//! Mock 模型（用于测试与本地演示，无需 API）
//!
//! - MockLlmClient：文本客户端，先回显为 echo 工具调用，拿到观察结果后给出文本回复
//! - ScriptedModel：按预设顺序逐条返回响应
//! - FnModel：由闭包根据请求动态生成响应

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::{InferenceRequest, LlmClient, LlmError, Message, ModelClient, ModelResponse};
use crate::session::Role;

/// Mock 文本客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Some(obs) = messages.last().filter(|m| m.role == Role::Tool) {
            return Ok(format!("Echo from Mock: {}", obs.content));
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(serde_json::json!({"tool": "echo", "args": {"text": last_user}}).to_string())
    }
}

/// 脚本化模型：每次 infer 弹出一条预设结果，用尽后返回 Unavailable
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 已发生的 infer 次数（含失败）
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn infer(&self, _request: &InferenceRequest) -> Result<ModelResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }
}

type InferFn = dyn Fn(&InferenceRequest) -> Result<ModelResponse, LlmError> + Send + Sync;

/// 闭包模型：可根据指令、历史决定输出
pub struct FnModel {
    f: Box<InferFn>,
}

impl FnModel {
    pub fn new(
        f: impl Fn(&InferenceRequest) -> Result<ModelResponse, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl ModelClient for FnModel {
    async fn infer(&self, request: &InferenceRequest) -> Result<ModelResponse, LlmError> {
        (self.f)(request)
    }
}
