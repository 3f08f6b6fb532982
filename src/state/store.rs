//! 作用域状态存储
//!
//! StateStore 持有后端与进程内 temp 表；StateHandle 是交给 Agent / 工具的显式句柄，
//! 绑定会话、用户、事件日志与当前行为者。
//!
//! 写入与读取共用一把提交锁：写入在锁内先落后端、成功后追加 StateMutation 事件，
//! 读者只能在锁外观察，因此看到新值时对应事件一定已在日志中；后端失败时不留事件。

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::core::OrchestrationError;
use crate::session::{Event, EventLog};
use crate::state::scope::{
    app_namespace, session_namespace, temp_namespace, user_namespace, APP_PREFIX,
};
use crate::state::{InMemoryBackend, Scope, StateBackend};

pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    temp: InMemoryBackend,
    commit: Mutex<()>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self {
            backend,
            temp: InMemoryBackend::new(),
            commit: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// 配置期写入 app: 键；key 可带或不带 "app:" 前缀
    pub fn configure_app(&self, key: &str, value: Value) -> Result<(), OrchestrationError> {
        let key = if key.starts_with(APP_PREFIX) {
            key.to_string()
        } else {
            format!("{}{}", APP_PREFIX, key)
        };
        self.backend.put(&app_namespace(), &key, &value)
    }

    /// 键所在的 (后端, 命名空间)
    fn locate(&self, session_id: &str, user_id: &str, key: &str) -> (&dyn StateBackend, String) {
        match Scope::of(key) {
            Scope::Temp => (&self.temp as &dyn StateBackend, temp_namespace(session_id)),
            Scope::User => (self.backend.as_ref(), user_namespace(user_id)),
            Scope::App => (self.backend.as_ref(), app_namespace()),
            Scope::Session => (self.backend.as_ref(), session_namespace(session_id)),
        }
    }

    pub fn read(
        &self,
        session_id: &str,
        user_id: &str,
        key: &str,
    ) -> Result<Option<Value>, OrchestrationError> {
        let _commit = self.commit.lock();
        self.read_committed(session_id, user_id, key)
    }

    fn read_committed(
        &self,
        session_id: &str,
        user_id: &str,
        key: &str,
    ) -> Result<Option<Value>, OrchestrationError> {
        let (backend, ns) = self.locate(session_id, user_id, key);
        backend.get(&ns, key)
    }

    /// 会话可见的全部键（含 app:），按字典序
    pub fn visible_keys(
        &self,
        session_id: &str,
        user_id: &str,
        prefix: &str,
    ) -> Result<Vec<String>, OrchestrationError> {
        let _commit = self.commit.lock();
        self.committed_keys(session_id, user_id, prefix)
    }

    fn committed_keys(
        &self,
        session_id: &str,
        user_id: &str,
        prefix: &str,
    ) -> Result<Vec<String>, OrchestrationError> {
        let mut keys = match Scope::of_prefix(prefix) {
            Some(scope) => {
                let (backend, ns) = self.locate(session_id, user_id, scope.prefix());
                backend.keys(&ns, prefix)?
            }
            None => {
                let mut all = self.temp.keys(&temp_namespace(session_id), prefix)?;
                all.extend(self.backend.keys(&user_namespace(user_id), prefix)?);
                all.extend(self.backend.keys(&app_namespace(), prefix)?);
                all.extend(self.backend.keys(&session_namespace(session_id), prefix)?);
                all
            }
        };
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// 可由事件重建的状态快照（temp:、user: 与会话键；不含 app:）
    pub fn snapshot(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<BTreeMap<String, Value>, OrchestrationError> {
        let _commit = self.commit.lock();
        let mut out = BTreeMap::new();
        for key in self.committed_keys(session_id, user_id, "")? {
            if Scope::of(&key) == Scope::App {
                continue;
            }
            if let Some(v) = self.read_committed(session_id, user_id, &key)? {
                out.insert(key, v);
            }
        }
        Ok(out)
    }

    /// 用户作用域的当前内容；会话开始时记作重建基线
    pub fn user_snapshot(&self, user_id: &str) -> Result<BTreeMap<String, Value>, OrchestrationError> {
        let _commit = self.commit.lock();
        let ns = user_namespace(user_id);
        let mut out = BTreeMap::new();
        for key in self.backend.keys(&ns, "")? {
            if let Some(v) = self.backend.get(&ns, &key)? {
                out.insert(key, v);
            }
        }
        Ok(out)
    }

    /// 会话结束：丢弃 temp: 与会话键；user: / app: 保留
    pub fn drop_session(&self, session_id: &str) -> Result<(), OrchestrationError> {
        self.temp.clear(&temp_namespace(session_id))?;
        self.backend.clear(&session_namespace(session_id))
    }

    fn mutate(
        &self,
        handle: &StateHandle,
        key: &str,
        value: Option<&Value>,
    ) -> Result<(), OrchestrationError> {
        if Scope::of(key) == Scope::App {
            return Err(OrchestrationError::PermissionDenied(format!(
                "'{}' is read-only at runtime",
                key
            )));
        }
        let (backend, ns) = self.locate(&handle.session_id, &handle.user_id, key);

        let _commit = self.commit.lock();
        match value {
            Some(v) => backend.put(&ns, key, v)?,
            None => backend.delete(&ns, key)?,
        }
        handle.log.append(
            Event::state_mutation(&handle.actor, key, value)
                .correlated(handle.correlation_id.clone())
                .on_branch(handle.branch.clone()),
        );
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// 执行期状态句柄
#[derive(Clone)]
pub struct StateHandle {
    store: Arc<StateStore>,
    log: Arc<EventLog>,
    session_id: String,
    user_id: String,
    actor: String,
    correlation_id: String,
    branch: String,
}

impl StateHandle {
    pub fn new(
        store: Arc<StateStore>,
        log: Arc<EventLog>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            log,
            session_id: session_id.into(),
            user_id: user_id.into(),
            actor: String::new(),
            correlation_id: String::new(),
            branch: String::new(),
        }
    }

    /// 换成另一个行为者 / 分支的句柄（共享同一存储与日志）
    pub fn scoped(&self, actor: &str, branch: &str) -> Self {
        Self {
            actor: actor.to_string(),
            branch: branch.to_string(),
            ..self.clone()
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match self.store.read(&self.session_id, &self.user_id, key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "state read failed");
                None
            }
        }
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), OrchestrationError> {
        self.store.mutate(self, key, Some(&value))
    }

    pub fn delete(&self, key: &str) -> Result<(), OrchestrationError> {
        self.store.mutate(self, key, None)
    }

    pub fn list(&self, prefix: &str) -> Result<Vec<String>, OrchestrationError> {
        self.store
            .visible_keys(&self.session_id, &self.user_id, prefix)
    }

    pub fn snapshot(&self) -> Result<BTreeMap<String, Value>, OrchestrationError> {
        self.store.snapshot(&self.session_id, &self.user_id)
    }
}
