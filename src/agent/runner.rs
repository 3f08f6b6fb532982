//! Agent 回合执行：Invoked → Reasoning → {Responding | RequestingTool | Delegating} → Completed
//!
//! RequestingTool 执行完本轮全部工具调用后回到 Reasoning，工具轮次与咨询轮次共同受 max_tool_rounds 约束；
//! Delegating 经 DelegationRouter 选出子节点：移交时结束本回合并把目标交给引擎，
//! 咨询时在本回合内运行目标、弹出后带着其回答继续推理。

use std::sync::Arc;

use serde_json::Value;
use tokio::time::timeout;

use crate::agent::{render, DelegationMode, LlmAgent};
use crate::core::{OrchestrationError, RecoveryAction, TurnPhase};
use crate::llm::{InferenceRequest, LlmError, ModelClient, ModelResponse};
use crate::session::{derive_context, ContextEntry, Event, Role};
use crate::workflow::{run_node, InvocationContext, Node, Outcome};

/// Agent 回合的结束方式
#[derive(Debug)]
pub enum AgentTurn {
    Responded(Outcome),
    /// 控制权已移交给目标（Delegation 事件已记录、目标已压入活动路径）
    Handoff(Node),
}

struct PhaseTracker<'a> {
    agent: &'a str,
    phase: TurnPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(agent: &'a str) -> Self {
        Self {
            agent,
            phase: TurnPhase::Invoked,
        }
    }

    fn advance(&mut self, next: TurnPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!(agent = self.agent, from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }
}

/// 执行一个 Agent 的回合；ctx.branch 已包含该 Agent
pub async fn run_agent_turn(
    agent: &Arc<LlmAgent>,
    ctx: &InvocationContext,
) -> Result<AgentTurn, OrchestrationError> {
    let settings = &ctx.runtime.settings;
    let state = ctx.state_for(&agent.name);
    let mut phase = PhaseTracker::new(&agent.name);
    // 只在本回合内可见的反馈（如无法解析的委派目标），不进入事件日志
    let mut notes: Vec<ContextEntry> = Vec::new();
    let mut rounds = 0usize;

    phase.advance(TurnPhase::Reasoning);
    loop {
        if ctx.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }

        let mut history = derive_context(
            &ctx.session.log.snapshot(),
            &settings.context_window,
            &agent.name,
        );
        history.extend(notes.iter().cloned());
        let request = InferenceRequest {
            agent: agent.name.clone(),
            instruction: render(&agent.instruction, &state),
            history,
            tools: agent.tools.schemas(),
            delegates: agent.candidates(),
        };
        let response = call_model(agent.model.as_ref(), &request, ctx).await?;

        if !response.tool_calls.is_empty() {
            rounds += 1;
            if rounds > settings.max_tool_rounds {
                return Err(OrchestrationError::ToolLoopExceeded(settings.max_tool_rounds));
            }
            phase.advance(TurnPhase::RequestingTool);
            for call in &response.tool_calls {
                ctx.append(Event::tool_call(&agent.name, &call.id, &call.name, &call.args));
            }
            let results = ctx
                .runtime
                .invoker
                .invoke_all(&agent.tools, &response.tool_calls, &ctx.tool_context(&agent.name))
                .await?;
            for r in &results {
                ctx.append(Event::tool_result(&r.tool, &r.call_id, &r.result));
            }
            phase.advance(TurnPhase::Reasoning);
            continue;
        }

        if let Some(target) = response.delegate.as_deref() {
            phase.advance(TurnPhase::Delegating);
            let chosen = ctx
                .runtime
                .router
                .choose(&agent.candidates(), target)
                .and_then(|name| agent.sub_agent(&name));
            let Some(sub) = chosen else {
                rounds += 1;
                if rounds > settings.max_tool_rounds {
                    return Err(OrchestrationError::ToolLoopExceeded(settings.max_tool_rounds));
                }
                let err = OrchestrationError::UnknownAgent(target.to_string());
                if let RecoveryAction::FeedBack(info) = ctx.runtime.recovery.on_turn_error(&err) {
                    notes.push(feedback_note(&agent.name, info));
                }
                tracing::warn!(agent = %agent.name, target, "delegation target not resolvable");
                phase.advance(TurnPhase::Reasoning);
                continue;
            };

            let to = sub.node.name().to_string();
            match sub.mode {
                DelegationMode::Handoff => {
                    ctx.push_delegation(&agent.name, &to, DelegationMode::Handoff)?;
                    phase.advance(TurnPhase::Completed);
                    return Ok(AgentTurn::Handoff(sub.node.clone()));
                }
                DelegationMode::Consult => {
                    rounds += 1;
                    if rounds > settings.max_tool_rounds {
                        return Err(OrchestrationError::ToolLoopExceeded(settings.max_tool_rounds));
                    }
                    ctx.push_delegation(&agent.name, &to, DelegationMode::Consult)?;
                    let consulted = run_node(&sub.node, ctx).await;
                    ctx.pop_delegation(&to);
                    consulted?;
                    phase.advance(TurnPhase::Reasoning);
                    continue;
                }
            }
        }

        phase.advance(TurnPhase::Responding);
        let text = response.text.unwrap_or_default();
        ctx.append(Event::agent_response(&agent.name, &text));
        if let Some(key) = &agent.output_key {
            state.set(key, Value::String(text.clone()))?;
        }
        phase.advance(TurnPhase::Completed);
        return Ok(AgentTurn::Responded(Outcome::leaf(&agent.name, text)));
    }
}

fn feedback_note(agent: &str, info: Value) -> ContextEntry {
    ContextEntry::new(Role::System, agent, format!("Delegation failed: {}", info))
}

/// 调用模型：每次尝试受超时与取消约束，失败时按 RecoveryEngine 的建议退避重试
async fn call_model(
    model: &dyn ModelClient,
    request: &InferenceRequest,
    ctx: &InvocationContext,
) -> Result<ModelResponse, OrchestrationError> {
    let recovery = &ctx.runtime.recovery;
    let attempt_timeout = recovery.retry_config().attempt_timeout;
    let mut attempt: u32 = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(OrchestrationError::Cancelled),
            r = timeout(attempt_timeout, model.infer(request)) => r.unwrap_or(Err(LlmError::Timeout)),
        };
        let err = match result {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };
        match recovery.on_model_error(&err, attempt) {
            RecoveryAction::Retry(backoff) => {
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => return Err(OrchestrationError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                attempt += 1;
            }
            _ => {
                return Err(OrchestrationError::ModelUnavailable {
                    attempts: attempt + 1,
                    reason: err.to_string(),
                })
            }
        }
    }
}
