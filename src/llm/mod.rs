//! LLM 层：推理协作者抽象、文本补全适配与 Mock 实现

pub mod mock;
pub mod text;
pub mod traits;

pub use mock::{FnModel, MockLlmClient, ScriptedModel};
pub use text::{parse_model_output, tool_call_schema_json, LlmClient, Message, TextModel};
pub use traits::{
    InferenceRequest, LlmError, ModelClient, ModelResponse, RetryConfig, ToolCallRequest,
};
