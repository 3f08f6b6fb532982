//! 上下文派生：Agent 不直接读取原始事件，只拿到派生并截断的历史视图
//!
//! 截断策略：先保留最近 max_events 条，再从最旧处丢弃直到总字符数不超过 max_chars（至少保留一条）。

use serde::{Deserialize, Serialize};

use crate::session::{Event, EventKind};

/// 消息角色（与 LLM API 一致，另加 Tool）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// 历史视图中的一条
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: Role,
    pub author: String,
    pub content: String,
}

impl ContextEntry {
    pub fn new(role: Role, author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            author: author.into(),
            content: content.into(),
        }
    }
}

/// 历史窗口
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextWindow {
    pub max_events: usize,
    pub max_chars: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            max_events: 50,
            max_chars: 16_000,
        }
    }
}

/// 将事件转为 viewer（当前 Agent）视角下的历史条目；StateMutation 不进入上下文
fn to_entry(event: &Event, viewer: &str) -> Option<ContextEntry> {
    let entry = match event.kind {
        EventKind::UserMessage => {
            ContextEntry::new(Role::User, &event.actor, event.text().unwrap_or_default())
        }
        EventKind::AgentResponse => {
            let text = event.text().unwrap_or_default();
            if event.actor == viewer {
                ContextEntry::new(Role::Assistant, &event.actor, text)
            } else {
                ContextEntry::new(Role::User, &event.actor, format!("[{}] said: {}", event.actor, text))
            }
        }
        EventKind::ToolCall => ContextEntry::new(
            Role::Assistant,
            &event.actor,
            format!(
                "Tool call {}: {}",
                event.tool_name().unwrap_or_default(),
                event.payload.get("args").cloned().unwrap_or_default()
            ),
        ),
        EventKind::ToolResult => ContextEntry::new(
            Role::Tool,
            &event.actor,
            format!(
                "{} -> {}",
                event.tool_name().unwrap_or_default(),
                event.payload.get("result").cloned().unwrap_or_default()
            ),
        ),
        EventKind::Delegation => ContextEntry::new(
            Role::System,
            &event.actor,
            format!(
                "{} transferred control to {} ({})",
                event.payload["from"].as_str().unwrap_or_default(),
                event.payload["to"].as_str().unwrap_or_default(),
                event.payload["mode"].as_str().unwrap_or_default()
            ),
        ),
        EventKind::StateMutation => return None,
    };
    Some(entry)
}

/// 按窗口派生历史视图
pub fn derive_context(events: &[Event], window: &ContextWindow, viewer: &str) -> Vec<ContextEntry> {
    let mut entries: Vec<ContextEntry> = events.iter().filter_map(|e| to_entry(e, viewer)).collect();

    if entries.len() > window.max_events {
        entries.drain(..entries.len() - window.max_events);
    }

    let mut total: usize = entries.iter().map(|e| e.content.chars().count()).sum();
    let mut drop = 0;
    while total > window.max_chars && entries.len() - drop > 1 {
        total -= entries[drop].content.chars().count();
        drop += 1;
    }
    entries.drain(..drop);
    entries
}
