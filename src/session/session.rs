//! 会话管理
//!
//! 会话拥有事件日志、活动路径栈（当前委派深度上的 Agent 名）与回合监管；
//! SessionManager 负责创建、查找、移除与空闲过期扫描。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, RwLock};

use crate::core::{SessionSupervisor, TurnStatus};
use crate::session::EventLog;

/// 会话 ID
pub type SessionId = String;

/// 单个会话
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub log: Arc<EventLog>,
    pub supervisor: SessionSupervisor,
    /// 活动路径栈；空栈表示根节点活动
    active_path: Mutex<Vec<String>>,
    /// 同一会话至多一个在途顶层回合
    turn_lock: AsyncMutex<()>,
    last_active: Mutex<Instant>,
    last_turn: Mutex<Option<TurnStatus>>,
    /// 会话开始时已存在的 user: 状态，事件回放的起点
    baseline: BTreeMap<String, Value>,
    pub created_at: Instant,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            log: Arc::new(EventLog::new()),
            supervisor: SessionSupervisor::new(),
            active_path: Mutex::new(Vec::new()),
            turn_lock: AsyncMutex::new(()),
            last_active: Mutex::new(Instant::now()),
            last_turn: Mutex::new(None),
            baseline: BTreeMap::new(),
            created_at: Instant::now(),
        }
    }

    pub fn with_baseline(mut self, baseline: BTreeMap<String, Value>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn baseline(&self) -> &BTreeMap<String, Value> {
        &self.baseline
    }

    /// 尝试占用回合锁；已有在途回合时返回 None
    pub fn try_begin(&self) -> Option<MutexGuard<'_, ()>> {
        self.touch();
        self.turn_lock.try_lock().ok()
    }

    pub fn active_path(&self) -> Vec<String> {
        self.active_path.lock().clone()
    }

    pub fn set_active_path(&self, path: Vec<String>) {
        *self.active_path.lock() = path;
    }

    /// 回到根节点
    pub fn reset_to_root(&self) {
        self.active_path.lock().clear();
    }

    pub fn last_turn(&self) -> Option<TurnStatus> {
        *self.last_turn.lock()
    }

    pub fn record_turn(&self, status: TurnStatus) {
        *self.last_turn.lock() = Some(status);
        self.touch();
    }

    pub fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    pub fn is_expired(&self, idle: Duration) -> bool {
        self.last_active.lock().elapsed() > idle && !self.supervisor.is_running()
    }
}

/// 会话管理器
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, user_id: &str, baseline: BTreeMap<String, Value>) -> Arc<Session> {
        let session = Arc::new(Session::new(user_id).with_baseline(baseline));
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::clone(&session));
        tracing::info!(session_id = %session.id, user_id, "session started");
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(session_id)
    }

    /// 返回空闲超时的会话 ID（不移除，由调用方走 end_session 清理）
    pub async fn expired(&self, idle: Duration) -> Vec<SessionId> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_expired(idle))
            .map(|s| s.id.clone())
            .collect()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
