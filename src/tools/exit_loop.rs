//! 循环终止工具
//!
//! 调用本身即信号：Loop 节点检查本轮迭代的事件子序列中是否出现该工具的 ToolCall。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::OrchestrationError;
use crate::tools::{Tool, ToolContext};

pub const EXIT_LOOP_TOOL: &str = "exit_loop";

pub struct ExitLoopTool {
    name: String,
}

impl ExitLoopTool {
    pub fn new() -> Self {
        Self::named(EXIT_LOOP_TOOL)
    }

    /// 与配置 engine.loop_termination_tool 对应的名称
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ExitLoopTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExitLoopTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Call this when the loop's goal is met to stop further iterations."
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<Value, OrchestrationError> {
        tracing::debug!(actor = ctx.state.actor(), "loop termination requested");
        Ok(serde_json::json!({ "escalate": true }))
    }
}
