//! 事件：会话执行历史的不可变记录
//!
//! 每个事件带会话内单调递增的序号、时间戳、行为者、种类、负载，
//! 以及关联 ID（同一顶层回合共享）与分支（产生该事件的节点路径）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 用户输入事件的行为者
pub const USER_ACTOR: &str = "user";

/// 事件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    UserMessage,
    AgentResponse,
    ToolCall,
    ToolResult,
    Delegation,
    StateMutation,
}

/// 单条事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Agent 名、"user" 或 "tool:<name>"
    pub actor: String,
    pub kind: EventKind,
    pub payload: Value,
    pub correlation_id: String,
    /// 点分节点路径，如 "root.pipeline.writer"
    pub branch: String,
}

impl Event {
    /// 构造待追加事件；seq 与 timestamp 由 EventLog::append 填写
    pub fn new(kind: EventKind, actor: impl Into<String>, payload: Value) -> Self {
        Self {
            seq: 0,
            timestamp: Utc::now(),
            actor: actor.into(),
            kind,
            payload,
            correlation_id: String::new(),
            branch: String::new(),
        }
    }

    pub fn correlated(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn user_message(text: &str) -> Self {
        Self::new(
            EventKind::UserMessage,
            USER_ACTOR,
            serde_json::json!({ "text": text }),
        )
    }

    pub fn agent_response(agent: &str, text: &str) -> Self {
        Self::new(
            EventKind::AgentResponse,
            agent,
            serde_json::json!({ "text": text }),
        )
    }

    pub fn tool_call(agent: &str, call_id: &str, tool: &str, args: &Value) -> Self {
        Self::new(
            EventKind::ToolCall,
            agent,
            serde_json::json!({ "call_id": call_id, "tool": tool, "args": args }),
        )
    }

    pub fn tool_result(tool: &str, call_id: &str, result: &Value) -> Self {
        Self::new(
            EventKind::ToolResult,
            tool_actor(tool),
            serde_json::json!({ "call_id": call_id, "tool": tool, "result": result }),
        )
    }

    pub fn delegation(from: &str, to: &str, mode: &str) -> Self {
        Self::new(
            EventKind::Delegation,
            from,
            serde_json::json!({ "from": from, "to": to, "mode": mode }),
        )
    }

    /// value 为 None 表示删除
    pub fn state_mutation(actor: &str, key: &str, value: Option<&Value>) -> Self {
        let payload = match value {
            Some(v) => serde_json::json!({ "key": key, "op": "set", "value": v }),
            None => serde_json::json!({ "key": key, "op": "delete" }),
        };
        Self::new(EventKind::StateMutation, actor, payload)
    }

    /// payload 中的 text 字段（UserMessage / AgentResponse）
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(Value::as_str)
    }

    /// ToolCall / ToolResult 的工具名
    pub fn tool_name(&self) -> Option<&str> {
        self.payload.get("tool").and_then(Value::as_str)
    }

    /// 事件是否产生于 branch 或其子分支
    pub fn within_branch(&self, branch: &str) -> bool {
        self.branch == branch
            || (self.branch.starts_with(branch) && self.branch[branch.len()..].starts_with('.'))
    }
}

pub fn tool_actor(tool: &str) -> String {
    format!("tool:{}", tool)
}
