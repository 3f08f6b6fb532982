//! 调用上下文：一次回合内在节点之间显式传递的句柄集合
//!
//! 会话、共享运行时、状态 / 工件句柄、取消令牌、关联 ID、当前分支，以及本回合的活动路径。
//! Sequential / Loop 的子节点共享父节点的活动路径；Parallel 的每个分支拿到独立副本。

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::agent::{DelegationMode, DelegationRouter};
use crate::artifacts::ArtifactHandle;
use crate::core::{OrchestrationError, RecoveryEngine};
use crate::session::{ContextWindow, Event, Session};
use crate::state::StateHandle;
use crate::tools::{ToolContext, ToolInvoker, EXIT_LOOP_TOOL};

/// 引擎限额与策略
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_tool_rounds: usize,
    pub max_delegation_depth: usize,
    pub loop_termination_tool: String,
    pub context_window: ContextWindow,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            max_delegation_depth: 4,
            loop_termination_tool: EXIT_LOOP_TOOL.to_string(),
            context_window: ContextWindow::default(),
        }
    }
}

/// 跨会话共享的执行设施
pub struct Runtime {
    pub invoker: ToolInvoker,
    pub recovery: RecoveryEngine,
    pub router: Arc<dyn DelegationRouter>,
    pub settings: EngineSettings,
}

#[derive(Clone)]
pub struct InvocationContext {
    pub session: Arc<Session>,
    pub runtime: Arc<Runtime>,
    pub state: StateHandle,
    pub artifacts: ArtifactHandle,
    pub cancel: CancellationToken,
    pub correlation_id: String,
    /// 点分节点路径
    pub branch: String,
    path: Arc<Mutex<Vec<String>>>,
}

impl InvocationContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<Session>,
        runtime: Arc<Runtime>,
        state: StateHandle,
        artifacts: ArtifactHandle,
        cancel: CancellationToken,
        correlation_id: impl Into<String>,
        branch: impl Into<String>,
        path: Vec<String>,
    ) -> Self {
        Self {
            session,
            runtime,
            state,
            artifacts,
            cancel,
            correlation_id: correlation_id.into(),
            branch: branch.into(),
            path: Arc::new(Mutex::new(path)),
        }
    }

    /// 进入子节点分支
    pub fn enter(&self, name: &str) -> Self {
        let branch = if self.branch.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.branch, name)
        };
        Self {
            branch,
            ..self.clone()
        }
    }

    /// 并行分支：独立的活动路径副本与子取消令牌
    pub fn fork(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            path: Arc::new(Mutex::new(self.path())),
            ..self.clone()
        }
    }

    pub fn path(&self) -> Vec<String> {
        self.path.lock().clone()
    }

    /// 以当前分支与关联 ID 追加事件
    pub fn append(&self, event: Event) -> u64 {
        self.session.log.append(
            event
                .correlated(self.correlation_id.clone())
                .on_branch(self.branch.clone()),
        )
    }

    /// 行为者视角的状态句柄
    pub fn state_for(&self, actor: &str) -> StateHandle {
        self.state.scoped(actor, &self.branch)
    }

    pub fn tool_context(&self, actor: &str) -> ToolContext {
        ToolContext {
            state: self.state_for(actor),
            artifacts: self.artifacts.clone(),
            cancel: self.cancel.clone(),
            call_id: String::new(),
        }
    }

    /// 委派：检查深度后把目标压入活动路径并记录 Delegation 事件
    ///
    /// 超过最大深度时不记录事件，返回 DelegationDepthExceeded。
    pub fn push_delegation(
        &self,
        from: &str,
        to: &str,
        mode: DelegationMode,
    ) -> Result<(), OrchestrationError> {
        let max = self.runtime.settings.max_delegation_depth;
        {
            let mut path = self.path.lock();
            if path.len() + 1 > max {
                tracing::warn!(from, to, depth = path.len() + 1, max, "delegation depth exceeded");
                return Err(OrchestrationError::DelegationDepthExceeded(max));
            }
            path.push(to.to_string());
        }
        tracing::info!(from, to, mode = mode.as_str(), "delegation");
        self.append(Event::delegation(from, to, mode.as_str()));
        Ok(())
    }

    /// 咨询结束，弹出目标
    pub fn pop_delegation(&self, to: &str) {
        let mut path = self.path.lock();
        if path.last().map(String::as_str) == Some(to) {
            path.pop();
        }
    }
}
