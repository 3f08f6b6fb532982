//! 工作流引擎
//!
//! run_node 对任意节点统一执行并产出 Outcome；组合节点递归调用，返回装箱 future。
//! Parallel 用 fork/join（不派生后台任务），首个致命错误丢弃其余分支并取消其令牌。

use futures_util::future::{try_join_all, BoxFuture};

use crate::agent::{run_agent_turn, AgentTurn, LlmAgent};
use crate::core::OrchestrationError;
use crate::llm::ToolCallRequest;
use crate::session::Event;
use crate::workflow::{InvocationContext, LoopNode, Node, Outcome, ParallelNode, SequentialNode, ToolNode};

/// 在 parent 的分支下执行 node
pub fn run_node<'a>(
    node: &'a Node,
    parent: &'a InvocationContext,
) -> BoxFuture<'a, Result<Outcome, OrchestrationError>> {
    Box::pin(async move {
        if parent.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        let ctx = parent.enter(node.name());
        tracing::debug!(node = node.name(), kind = node.kind(), branch = %ctx.branch, "run node");
        match node {
            Node::Agent(agent) => run_agent(agent, &ctx).await,
            Node::Sequential(seq) => run_sequential(seq, &ctx).await,
            Node::Parallel(par) => run_parallel(par, &ctx).await,
            Node::Loop(lp) => run_loop(lp, &ctx).await,
            Node::Tool(step) => run_tool_step(step, &ctx).await,
        }
    })
}

/// Agent 回合；移交时在 Agent 的分支下继续执行目标，目标的结果即本节点结果
async fn run_agent(
    agent: &std::sync::Arc<LlmAgent>,
    ctx: &InvocationContext,
) -> Result<Outcome, OrchestrationError> {
    match run_agent_turn(agent, ctx).await? {
        AgentTurn::Responded(outcome) => Ok(outcome),
        AgentTurn::Handoff(target) => run_node(&target, ctx).await,
    }
}

async fn run_sequential(
    seq: &SequentialNode,
    ctx: &InvocationContext,
) -> Result<Outcome, OrchestrationError> {
    let mut children = Vec::with_capacity(seq.children.len());
    for child in &seq.children {
        children.push(run_node(child, ctx).await?);
    }
    let mut outcome = Outcome::composite(&seq.name, children);
    outcome.output = outcome.children.last().and_then(|c| c.output.clone());
    Ok(outcome)
}

async fn run_parallel(
    par: &ParallelNode,
    ctx: &InvocationContext,
) -> Result<Outcome, OrchestrationError> {
    let group = ctx.cancel.child_token();
    let forks: Vec<InvocationContext> = par
        .children
        .iter()
        .map(|_| ctx.fork(group.clone()))
        .collect();
    let joined = try_join_all(
        par.children
            .iter()
            .zip(forks.iter())
            .map(|(child, fork)| run_node(child, fork)),
    )
    .await;

    match joined {
        Ok(children) => {
            let mut outcome = Outcome::composite(&par.name, children);
            let outputs: Vec<String> = outcome
                .children
                .iter()
                .filter_map(|c| c.output.clone())
                .collect();
            if !outputs.is_empty() {
                outcome.output = Some(outputs.join("\n\n"));
            }
            Ok(outcome)
        }
        Err(e) => {
            group.cancel();
            tracing::warn!(node = %par.name, error = %e, "parallel branch failed, siblings cancelled");
            Err(e)
        }
    }
}

async fn run_loop(lp: &LoopNode, ctx: &InvocationContext) -> Result<Outcome, OrchestrationError> {
    let termination_tool = &ctx.runtime.settings.loop_termination_tool;
    let log = &ctx.session.log;
    let mut children = Vec::new();
    let mut iterations = 0;
    let mut escalated = false;

    while iterations < lp.max_iterations && !escalated {
        iterations += 1;
        let iteration_start = log.next_seq();
        for child in &lp.children {
            children.push(run_node(child, ctx).await?);
            if log.has_tool_call_since(iteration_start, termination_tool, &ctx.branch) {
                escalated = true;
                break;
            }
        }
    }

    let max_iterations_reached = !escalated && iterations == lp.max_iterations;
    tracing::info!(node = %lp.name, iterations, escalated, max_iterations_reached, "loop finished");
    let mut outcome = Outcome::composite(&lp.name, children);
    outcome.output = outcome.children.last().and_then(|c| c.output.clone());
    outcome.iterations = iterations;
    outcome.escalated = escalated;
    outcome.max_iterations_reached = max_iterations_reached;
    Ok(outcome)
}

/// 工具步骤：记录 ToolCall / ToolResult，错误结果转为 ToolFailed
async fn run_tool_step(step: &ToolNode, ctx: &InvocationContext) -> Result<Outcome, OrchestrationError> {
    let call = ToolCallRequest::new(step.tool.name(), step.args.clone());
    ctx.append(Event::tool_call(&step.name, &call.id, &call.name, &call.args));
    let result = ctx
        .runtime
        .invoker
        .invoke(&step.registry, &call, &ctx.tool_context(&step.name))
        .await?;
    ctx.append(Event::tool_result(&result.tool, &result.call_id, &result.result));

    if !result.is_ok() {
        let message = result
            .result
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("tool returned an error");
        return Err(OrchestrationError::ToolFailed(format!("{}: {}", step.name, message)));
    }
    if let Some(key) = &step.output_key {
        ctx.state_for(&step.name).set(key, result.result.clone())?;
    }
    Ok(Outcome::leaf(&step.name, result.result.to_string()))
}
