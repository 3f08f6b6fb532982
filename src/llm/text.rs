//! 文本补全适配层
//!
//! 对只会输出文本的聊天模型（LlmClient），把推理请求拼成 system + messages，
//! 再用 parse_model_output 从回复中提取 JSON（工具调用 / 转交 Agent）或直接作为文本回复。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::llm::{InferenceRequest, LlmError, ModelClient, ModelResponse, ToolCallRequest};
use crate::session::Role;

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 文本 LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;
}

/// 工具调用格式（仅用于 Schema 生成，拼入 system prompt）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名
    pub tool: String,
    /// 工具参数
    pub args: HashMap<String, serde_json::Value>,
}

/// 返回工具调用的 JSON Schema 字符串
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawDirective {
    tool: Option<String>,
    #[serde(default)]
    args: serde_json::Value,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
    transfer_to_agent: Option<String>,
}

/// 解析模型文本输出：
/// - 含 JSON 且有 tool / tool_calls → 工具调用
/// - 含 JSON 且有 transfer_to_agent → 委派
/// - 无 JSON → 文本回复
/// - JSON 非法：代码块或含指令键 → MalformedOutput，否则按普通文本（如 "the set {1, 2}"）
pub fn parse_model_output(output: &str) -> Result<ModelResponse, LlmError> {
    let trimmed = output.trim();
    let fenced = trimmed.contains("```json");

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            return Ok(ModelResponse::text(trimmed));
        }
    } else {
        return Ok(ModelResponse::text(trimmed));
    };

    let raw: RawDirective = match serde_json::from_str(json_str) {
        Ok(raw) => raw,
        Err(e) if fenced || mentions_directive(json_str) => {
            return Err(LlmError::MalformedOutput(format!("{}: {}", e, json_str)));
        }
        Err(_) => return Ok(ModelResponse::text(trimmed)),
    };

    let mut calls: Vec<ToolCallRequest> = raw
        .tool_calls
        .into_iter()
        .filter(|c| !c.tool.is_empty())
        .map(|c| ToolCallRequest::new(c.tool, normalize_args(c.args)))
        .collect();
    if let Some(tool) = raw.tool.filter(|t| !t.is_empty()) {
        calls.insert(0, ToolCallRequest::new(tool, normalize_args(raw.args)));
    }
    if !calls.is_empty() {
        return Ok(ModelResponse::tool_calls(calls));
    }
    if let Some(target) = raw.transfer_to_agent.filter(|t| !t.is_empty()) {
        return Ok(ModelResponse::delegate(target));
    }
    Ok(ModelResponse::text(trimmed))
}

fn mentions_directive(candidate: &str) -> bool {
    ["\"tool\"", "\"tool_calls\"", "\"transfer_to_agent\""]
        .iter()
        .any(|key| candidate.contains(key))
}

fn normalize_args(args: serde_json::Value) -> serde_json::Value {
    if args.is_null() {
        serde_json::json!({})
    } else {
        args
    }
}

/// 将 LlmClient 适配为 ModelClient
pub struct TextModel {
    llm: Arc<dyn LlmClient>,
}

impl TextModel {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 拼 system：指令 + 可用工具 + 可转交的 Agent + 输出格式约束
    fn system_prompt(request: &InferenceRequest) -> String {
        let mut s = request.instruction.clone();
        if !request.tools.is_empty() {
            let tools = serde_json::to_string_pretty(&request.tools).unwrap_or_default();
            s.push_str(&format!("\n\n## Available tools\n{}\n", tools));
            s.push_str(&format!(
                "To call a tool, output only one JSON object matching:\n{}\n",
                tool_call_schema_json()
            ));
        }
        if !request.delegates.is_empty() {
            s.push_str("\n## Agents you can transfer to\n");
            for d in &request.delegates {
                s.push_str(&format!("- {}: {}\n", d.name, d.description));
            }
            s.push_str("To transfer, output only: {\"transfer_to_agent\": \"<name>\"}\n");
        }
        s
    }
}

#[async_trait]
impl ModelClient for TextModel {
    async fn infer(&self, request: &InferenceRequest) -> Result<ModelResponse, LlmError> {
        let mut messages = vec![Message::system(Self::system_prompt(request))];
        messages.extend(request.history.iter().map(|e| Message {
            role: e.role,
            content: e.content.clone(),
        }));
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(LlmError::Unavailable)?;
        parse_model_output(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text() {
        let r = parse_model_output("Return approved").unwrap();
        assert_eq!(r.text.as_deref(), Some("Return approved"));
        assert!(r.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_single_tool_call_in_fence() {
        let out = "```json\n{\"tool\": \"validate_return\", \"args\": {\"item_id\": 42}}\n```";
        let r = parse_model_output(out).unwrap();
        assert_eq!(r.tool_calls.len(), 1);
        assert_eq!(r.tool_calls[0].name, "validate_return");
        assert_eq!(r.tool_calls[0].args["item_id"], 42);
    }

    #[test]
    fn test_parse_multiple_tool_calls_keeps_order() {
        let out = r#"{"tool_calls": [{"tool": "a", "args": {}}, {"tool": "b"}]}"#;
        let r = parse_model_output(out).unwrap();
        let names: Vec<_> = r.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(r.tool_calls[1].args, serde_json::json!({}));
    }

    #[test]
    fn test_parse_transfer() {
        let r = parse_model_output(r#"{"transfer_to_agent": "Returns"}"#).unwrap();
        assert_eq!(r.delegate.as_deref(), Some("Returns"));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = parse_model_output("{\"tool\": }").unwrap_err();
        assert!(matches!(err, LlmError::MalformedOutput(_)));

        let fenced = parse_model_output("```json\n{1, 2}\n```").unwrap_err();
        assert!(matches!(fenced, LlmError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_prose_with_braces_is_text() {
        let r = parse_model_output("the set {1, 2} has two elements").unwrap();
        assert_eq!(r.text.as_deref(), Some("the set {1, 2} has two elements"));
        assert!(r.tool_calls.is_empty());
        assert!(r.delegate.is_none());
    }

    #[test]
    fn test_tool_call_schema_mentions_fields() {
        let s = tool_call_schema_json();
        assert!(s.contains("tool"));
        assert!(s.contains("args"));
    }
}
