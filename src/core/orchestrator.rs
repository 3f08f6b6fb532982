//! 编排器：面向宿主的会话入口
//!
//! 每条输入：占用会话回合锁 → 记录 UserMessage → 解析活动节点（活动路径栈顶，否则根）→ 执行 →
//! 成功时沿活动路径向根弹出非 keep_active 的 Agent；失败时以带关联 ID 的 TurnFailure 返回。
//! 回合超时与 cancel 都通过回合取消令牌生效，已提交的状态变更保留。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::artifacts::{ArtifactHandle, BlobStore};
use crate::core::{OrchestrationError, TurnFailure, TurnStatus};
use crate::session::{Event, Replay, Session, SessionId, SessionManager};
use crate::state::{reconstruct_state_from, StateHandle, StateStore};
use crate::workflow::{run_node, AgentTree, InvocationContext, Node, Outcome, Runtime};

/// 成功回合的返回
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub session_id: SessionId,
    pub correlation_id: String,
    /// 给出最终回答的节点
    pub author: String,
    pub text: String,
    /// 回合结束后的活动路径（不含根）
    pub active_path: Vec<String>,
    pub last_seq: Option<u64>,
    pub outcome: Outcome,
}

pub struct Orchestrator {
    tree: AgentTree,
    runtime: Arc<Runtime>,
    sessions: SessionManager,
    state: Arc<StateStore>,
    blobs: Arc<dyn BlobStore>,
    turn_timeout: Duration,
    idle_timeout: Duration,
}

impl Orchestrator {
    pub(crate) fn new(
        tree: AgentTree,
        runtime: Arc<Runtime>,
        state: Arc<StateStore>,
        blobs: Arc<dyn BlobStore>,
        turn_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            tree,
            runtime,
            sessions: SessionManager::new(),
            state,
            blobs,
            turn_timeout,
            idle_timeout,
        }
    }

    pub fn root(&self) -> &Node {
        self.tree.root()
    }

    /// 新建会话；此刻已有的 user: 状态记为该会话的回放基线
    pub async fn start_session(&self, user_id: &str) -> Result<SessionId, OrchestrationError> {
        let baseline = self.state.user_snapshot(user_id)?;
        Ok(self.sessions.create(user_id, baseline).await.id.clone())
    }

    async fn session(&self, session_id: &str) -> Result<Arc<Session>, OrchestrationError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| OrchestrationError::SessionNotFound(session_id.to_string()))
    }

    fn artifacts_for(&self, session: &Session) -> ArtifactHandle {
        ArtifactHandle::new(Arc::clone(&self.blobs), &session.id, &session.user_id)
    }

    /// 处理一条用户输入
    pub async fn send(&self, session_id: &str, input: &str) -> Result<TurnResponse, TurnFailure> {
        let correlation_id = format!("turn_{}", uuid::Uuid::new_v4().simple());
        let session = self
            .session(session_id)
            .await
            .map_err(|e| TurnFailure::new(&e, &correlation_id, None))?;
        if session.supervisor.is_shutdown() {
            let err = OrchestrationError::SessionNotFound(session_id.to_string());
            return Err(TurnFailure::new(&err, &correlation_id, session.log.last_seq()));
        }
        let Some(_turn) = session.try_begin() else {
            let err = OrchestrationError::SessionBusy(session_id.to_string());
            return Err(TurnFailure::new(&err, &correlation_id, session.log.last_seq()));
        };

        let cancel = session.supervisor.begin_turn();
        tracing::info!(session_id, correlation_id = %correlation_id, "turn started");
        session.log.append(
            Event::user_message(input)
                .correlated(correlation_id.clone())
                .on_branch(self.tree.root().name()),
        );

        let result = match timeout(
            self.turn_timeout,
            self.run_turn(&session, &correlation_id, cancel.clone()),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => {
                cancel.cancel();
                tracing::warn!(session_id, correlation_id = %correlation_id, "turn timed out");
                Err(OrchestrationError::Cancelled)
            }
        };
        session.supervisor.finish_turn();

        match result {
            Ok((outcome, path)) => {
                session.set_active_path(path.clone());
                session.record_turn(TurnStatus::Completed);
                tracing::info!(session_id, correlation_id = %correlation_id, author = %outcome.author, "turn completed");
                Ok(TurnResponse {
                    session_id: session.id.clone(),
                    correlation_id,
                    author: final_author(&outcome),
                    text: outcome.output.clone().unwrap_or_default(),
                    active_path: path,
                    last_seq: session.log.last_seq(),
                    outcome,
                })
            }
            Err(err) => {
                if matches!(err, OrchestrationError::DelegationDepthExceeded(_)) {
                    session.reset_to_root();
                }
                let failure = TurnFailure::new(&err, &correlation_id, session.log.last_seq());
                session.record_turn(failure.status);
                tracing::warn!(session_id, correlation_id = %correlation_id, kind = %failure.kind, error = %err, "turn failed");
                Err(failure)
            }
        }
    }

    async fn run_turn(
        &self,
        session: &Arc<Session>,
        correlation_id: &str,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<(Outcome, Vec<String>), OrchestrationError> {
        let mut path = session.active_path();
        let node = match path.last().and_then(|name| self.tree.get(name)) {
            Some(node) => node.clone(),
            None => {
                if !path.is_empty() {
                    tracing::warn!(path = ?path, "stale active path, resuming at root");
                    path.clear();
                }
                self.tree.root().clone()
            }
        };
        let base_branch = self
            .tree
            .parent_branch(node.name())
            .unwrap_or_default()
            .to_string();

        let state = StateHandle::new(
            Arc::clone(&self.state),
            Arc::clone(&session.log),
            &session.id,
            &session.user_id,
        )
        .with_correlation(correlation_id);
        let ctx = InvocationContext::new(
            Arc::clone(session),
            Arc::clone(&self.runtime),
            state,
            self.artifacts_for(session),
            cancel,
            correlation_id,
            base_branch,
            path,
        );

        let outcome = run_node(&node, &ctx).await?;

        let mut path = ctx.path();
        while let Some(top) = path.last() {
            if self.tree.keeps_active(top) {
                break;
            }
            path.pop();
        }
        Ok((outcome, path))
    }

    pub async fn get_state(&self, session_id: &str, key: &str) -> Result<Option<Value>, OrchestrationError> {
        let session = self.session(session_id).await?;
        self.state.read(&session.id, &session.user_id, key)
    }

    /// 会话可见状态的快照（不含 app:），与事件重建结果可直接比较
    pub async fn state_snapshot(&self, session_id: &str) -> Result<BTreeMap<String, Value>, OrchestrationError> {
        let session = self.session(session_id).await?;
        self.state.snapshot(&session.id, &session.user_id)
    }

    /// 从基线与本会话事件重建的状态，应与 state_snapshot 一致
    pub async fn rebuild_state(&self, session_id: &str) -> Result<BTreeMap<String, Value>, OrchestrationError> {
        let session = self.session(session_id).await?;
        Ok(reconstruct_state_from(session.baseline().clone(), &session.log.snapshot()))
    }

    pub async fn list_artifacts(&self, session_id: &str, prefix: &str) -> Result<Vec<String>, OrchestrationError> {
        let session = self.session(session_id).await?;
        self.artifacts_for(&session).list(prefix).await
    }

    /// 取消在途回合；没有在途回合时返回 false
    pub async fn cancel(&self, session_id: &str) -> Result<bool, OrchestrationError> {
        let session = self.session(session_id).await?;
        let cancelled = session.supervisor.cancel();
        if cancelled {
            tracing::info!(session_id, "turn cancel requested");
        }
        Ok(cancelled)
    }

    pub async fn events(&self, session_id: &str) -> Result<Vec<Event>, OrchestrationError> {
        Ok(self.session(session_id).await?.log.snapshot())
    }

    pub async fn replay(&self, session_id: &str, from_seq: u64) -> Result<Replay, OrchestrationError> {
        Ok(self.session(session_id).await?.log.replay(from_seq))
    }

    pub async fn active_path(&self, session_id: &str) -> Result<Vec<String>, OrchestrationError> {
        Ok(self.session(session_id).await?.active_path())
    }

    pub async fn last_turn_status(&self, session_id: &str) -> Result<Option<TurnStatus>, OrchestrationError> {
        Ok(self.session(session_id).await?.last_turn())
    }

    /// 结束会话：取消在途工作，丢弃 temp: / 会话状态与会话工件；user: 与 app: 保留
    pub async fn end_session(&self, session_id: &str) -> Result<(), OrchestrationError> {
        let session = self
            .sessions
            .remove(session_id)
            .await
            .ok_or_else(|| OrchestrationError::SessionNotFound(session_id.to_string()))?;
        session.supervisor.shutdown();
        self.state.drop_session(&session.id)?;
        self.artifacts_for(&session).clear_session().await?;
        tracing::info!(session_id, events = session.log.len(), "session ended");
        Ok(())
    }

    /// 结束所有空闲超时的会话，返回其 ID
    pub async fn expire_idle_sessions(&self) -> Vec<SessionId> {
        let expired = self.sessions.expired(self.idle_timeout).await;
        for id in &expired {
            if let Err(e) = self.end_session(id).await {
                tracing::warn!(session_id = %id, error = %e, "failed to expire session");
            }
        }
        expired
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }
}

/// 组合节点的结果取最后一个有输出的叶子作为作者
fn final_author(outcome: &Outcome) -> String {
    fn last_leaf(o: &Outcome) -> Option<&Outcome> {
        if o.children.is_empty() {
            return o.output.as_ref().map(|_| o);
        }
        o.children.iter().rev().find_map(last_leaf)
    }
    last_leaf(outcome)
        .map(|o| o.author.clone())
        .unwrap_or_else(|| outcome.author.clone())
}
