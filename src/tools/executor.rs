//! 工具调用器
//!
//! invoke 依次做：查找工具、按 schema 校验参数、获取并发许可、在超时与取消令牌下执行，
//! 最后把结果归一化为带 status 的 JSON 对象。回合内错误（参数、超时、未知工具、工具失败、越权）
//! 都作为错误结果返回给 Agent；只有取消向上传播。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::core::{OrchestrationError, TaskScheduler};
use crate::llm::ToolCallRequest;
use crate::tools::{validate_args, ToolContext, ToolRegistry};

/// 单次调用的归一化结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool: String,
    pub result: Value,
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        self.result.get("status").and_then(Value::as_str) == Some("ok")
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.result.get("error_kind").and_then(Value::as_str)
    }
}

pub struct ToolInvoker {
    timeout: Duration,
    scheduler: Arc<TaskScheduler>,
}

impl ToolInvoker {
    pub fn new(timeout: Duration, scheduler: Arc<TaskScheduler>) -> Self {
        Self { timeout, scheduler }
    }

    /// 执行单个调用；仅在取消时返回 Err
    pub async fn invoke(
        &self,
        registry: &ToolRegistry,
        call: &ToolCallRequest,
        ctx: &ToolContext,
    ) -> Result<ToolResult, OrchestrationError> {
        let start = Instant::now();
        let ctx = ctx.for_call(&call.id);
        let outcome = self.run(registry, call, &ctx).await;

        let outcome_label = match &outcome {
            Ok(_) => "ok",
            Err(OrchestrationError::Cancelled) => "cancelled",
            Err(OrchestrationError::ToolTimeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "actor": ctx.state.actor(),
            "ok": outcome.is_ok(),
            "outcome": outcome_label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        if let Err(OrchestrationError::Cancelled) = outcome {
            return Err(OrchestrationError::Cancelled);
        }
        Ok(ToolResult {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            result: normalize(outcome),
        })
    }

    /// 并发执行同一回合的多个调用，全部完成后按请求顺序返回
    pub async fn invoke_all(
        &self,
        registry: &ToolRegistry,
        calls: &[ToolCallRequest],
        ctx: &ToolContext,
    ) -> Result<Vec<ToolResult>, OrchestrationError> {
        join_all(calls.iter().map(|call| self.invoke(registry, call, ctx)))
            .await
            .into_iter()
            .collect()
    }

    async fn run(
        &self,
        registry: &ToolRegistry,
        call: &ToolCallRequest,
        ctx: &ToolContext,
    ) -> Result<Value, OrchestrationError> {
        let tool = registry
            .get(&call.name)
            .ok_or_else(|| OrchestrationError::UnknownTool(call.name.clone()))?;
        validate_args(&call.name, &tool.parameters_schema(), &call.args)?;

        let _permit = tokio::select! {
            permit = self.scheduler.acquire_tool() => permit?,
            _ = ctx.cancel.cancelled() => return Err(OrchestrationError::Cancelled),
        };
        tracing::debug!(tool = %call.name, free_slots = self.scheduler.available_tool_slots(), "tool permit acquired");
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(OrchestrationError::Cancelled),
            res = timeout(self.timeout, tool.execute(call.args.clone(), ctx)) => match res {
                Ok(r) => r,
                Err(_) => Err(OrchestrationError::ToolTimeout(call.name.clone())),
            },
        }
    }
}

/// 成功对象补 "status": "ok"，非对象包进 result 字段；错误转为 {status, error_kind, message}
pub fn normalize(outcome: Result<Value, OrchestrationError>) -> Value {
    match outcome {
        Ok(Value::Object(mut map)) => {
            map.entry("status")
                .or_insert_with(|| Value::String("ok".to_string()));
            Value::Object(map)
        }
        Ok(other) => serde_json::json!({ "status": "ok", "result": other }),
        Err(e) => serde_json::json!({
            "status": "error",
            "error_kind": e.kind().as_str(),
            "message": e.to_string(),
        }),
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
