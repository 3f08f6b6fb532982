//! 编排器构建器：统一的初始化逻辑
//!
//! 按配置组装状态后端、工具调用器、恢复引擎与路由，校验 Agent 树，并把 [app_state] 写入 app: 作用域。

use std::sync::Arc;

use crate::agent::{DelegationRouter, NameMatchRouter};
use crate::artifacts::{BlobStore, InMemoryBlobStore};
use crate::config::AppConfig;
use crate::core::{Orchestrator, OrchestrationError, RecoveryEngine, TaskScheduler};
use crate::state::{InMemoryBackend, SqliteBackend, StateBackend, StateStore};
use crate::tools::ToolInvoker;
use crate::workflow::{AgentTree, Node, Runtime};

pub struct OrchestratorBuilder {
    root: Node,
    config: AppConfig,
    router: Option<Arc<dyn DelegationRouter>>,
    backend: Option<Arc<dyn StateBackend>>,
    blobs: Option<Arc<dyn BlobStore>>,
}

impl OrchestratorBuilder {
    pub fn new(root: impl Into<Node>) -> Self {
        Self {
            root: root.into(),
            config: AppConfig::default(),
            router: None,
            backend: None,
            blobs: None,
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// 替换默认的名称匹配路由（测试中用确定性路由）
    pub fn with_router(mut self, router: Arc<dyn DelegationRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// 显式指定状态后端；未指定时按 [state] 段选择
    pub fn with_state_backend(mut self, backend: Arc<dyn StateBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    fn backend_from_config(&self) -> Result<Arc<dyn StateBackend>, OrchestrationError> {
        match self.config.state.backend.to_lowercase().as_str() {
            "memory" => Ok(Arc::new(InMemoryBackend::new())),
            "sqlite" => {
                tracing::info!(path = %self.config.state.sqlite_path.display(), "Using SQLite state backend");
                Ok(Arc::new(SqliteBackend::open(&self.config.state.sqlite_path)?))
            }
            other => Err(OrchestrationError::ConfigError(format!(
                "unknown state backend '{}'",
                other
            ))),
        }
    }

    pub fn build(self) -> Result<Orchestrator, OrchestrationError> {
        let tree = AgentTree::new(self.root.clone())?;
        let backend = match &self.backend {
            Some(b) => Arc::clone(b),
            None => self.backend_from_config()?,
        };
        let state = Arc::new(StateStore::new(backend));
        for (key, value) in &self.config.app_state {
            state.configure_app(key, value.clone())?;
        }

        let scheduler = Arc::new(TaskScheduler::new(self.config.tools.max_concurrent_tools));
        let max_concurrent_tools = scheduler.max_concurrent_tools();
        let runtime = Arc::new(Runtime {
            invoker: ToolInvoker::new(self.config.tool_timeout(), scheduler),
            recovery: RecoveryEngine::new(self.config.retry()),
            router: self.router.unwrap_or_else(|| Arc::new(NameMatchRouter)),
            settings: self.config.engine_settings(),
        });
        tracing::info!(
            root = tree.root().name(),
            nodes = tree.len(),
            app_keys = self.config.app_state.len(),
            max_concurrent_tools,
            "orchestrator ready"
        );

        Ok(Orchestrator::new(
            tree,
            runtime,
            state,
            self.blobs.unwrap_or_else(|| Arc::new(InMemoryBlobStore::new())),
            self.config.turn_timeout(),
            self.config.session_idle_timeout(),
        ))
    }
}
