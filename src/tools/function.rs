//! 闭包工具：把普通函数包装为 Tool

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::core::OrchestrationError;
use crate::tools::{Tool, ToolContext};

type ToolFn =
    Arc<dyn Fn(Value, ToolContext) -> BoxFuture<'static, Result<Value, OrchestrationError>> + Send + Sync>;

pub struct FunctionTool {
    name: String,
    description: String,
    schema: Value,
    func: ToolFn,
}

impl FunctionTool {
    /// 异步闭包工具
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, schema: Value, f: F) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, OrchestrationError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            func: Arc::new(move |args, ctx| Box::pin(f(args, ctx))),
        }
    }

    /// 同步闭包工具
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, schema: Value, f: F) -> Self
    where
        F: Fn(Value, &ToolContext) -> Result<Value, OrchestrationError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, description, schema, move |args, ctx| {
            let f = Arc::clone(&f);
            async move { f(args, &ctx) }
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, OrchestrationError> {
        (self.func)(args, ctx.clone()).await
    }
}
