//! 工具参数 Schema：schemars 生成、jsonschema 校验

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::core::OrchestrationError;

/// 由参数类型生成 JSON Schema
pub fn typed_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// 按 schema 校验参数；不符合时返回 InvalidArguments，列出全部违规项
pub fn validate_args(tool: &str, schema: &Value, args: &Value) -> Result<(), OrchestrationError> {
    let validator = jsonschema::Validator::new(schema).map_err(|e| {
        OrchestrationError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("invalid tool schema: {e}"),
        }
    })?;
    if validator.is_valid(args) {
        return Ok(());
    }
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    Err(OrchestrationError::InvalidArguments {
        tool: tool.to_string(),
        reason: errors.join("; "),
    })
}
