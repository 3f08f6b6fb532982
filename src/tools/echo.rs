//! Echo 工具（测试与演示用）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::OrchestrationError;
use crate::tools::{typed_schema, Tool, ToolContext};

#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
struct EchoArgs {
    /// 要回显的文本
    text: String,
}

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back. Args: {\"text\": \"message\"}"
    }

    fn parameters_schema(&self) -> Value {
        typed_schema::<EchoArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, OrchestrationError> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(serde_json::json!({ "text": text }))
    }
}
