//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__ENGINE__MAX_TOOL_ROUNDS=4`）。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::RetryConfig;
use crate::session::ContextWindow;
use crate::tools::EXIT_LOOP_TOOL;
use crate::workflow::EngineSettings;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub model: ModelSection,
    pub tools: ToolsSection,
    pub context: ContextSection,
    pub state: StateSection,
    pub sessions: SessionsSection,
    /// [app_state] 段：启动时写入 app: 作用域的键值（键不带前缀）
    pub app_state: BTreeMap<String, serde_json::Value>,
}

/// [engine] 段：回合内限额
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// 单回合内工具 / 咨询轮次上限
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_max_delegation_depth")]
    pub max_delegation_depth: usize,
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    /// Loop 节点的终止工具名
    #[serde(default = "default_loop_termination_tool")]
    pub loop_termination_tool: String,
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_max_delegation_depth() -> usize {
    4
}

fn default_turn_timeout_secs() -> u64 {
    300
}

fn default_loop_termination_tool() -> String {
    EXIT_LOOP_TOOL.to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_delegation_depth: default_max_delegation_depth(),
            turn_timeout_secs: default_turn_timeout_secs(),
            loop_termination_tool: default_loop_termination_tool(),
        }
    }
}

/// [model] 段：单次推理超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 首次重试的退避（毫秒），之后逐次翻倍
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_model_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    200
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_model_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// [tools] 段：工具超时与并发
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: usize,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_tools() -> usize {
    4
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            max_concurrent_tools: default_max_concurrent_tools(),
        }
    }
}

/// [context] 段：派生历史的截断窗口
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_events() -> usize {
    50
}

fn default_max_chars() -> usize {
    16_000
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_chars: default_max_chars(),
        }
    }
}

/// [state] 段：状态后端（memory / sqlite）
#[derive(Debug, Clone, Deserialize)]
pub struct StateSection {
    #[serde(default = "default_state_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
}

fn default_state_backend() -> String {
    "memory".to_string()
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/state.db")
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            backend: default_state_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

/// [sessions] 段：空闲过期
#[derive(Debug, Clone, Deserialize)]
pub struct SessionsSection {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.model.max_retries,
            base_backoff: Duration::from_millis(self.model.backoff_ms),
            attempt_timeout: Duration::from_secs(self.model.timeout_secs),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_tool_rounds: self.engine.max_tool_rounds,
            max_delegation_depth: self.engine.max_delegation_depth,
            loop_termination_tool: self.engine.loop_termination_tool.clone(),
            context_window: ContextWindow {
                max_events: self.context.max_events,
                max_chars: self.context.max_chars,
            },
        }
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.turn_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.tool_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_timeout_secs)
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engine.max_tool_rounds, 8);
        assert_eq!(cfg.engine.loop_termination_tool, "exit_loop");
        assert_eq!(cfg.retry().base_backoff, Duration::from_millis(200));
        assert_eq!(cfg.engine_settings().context_window.max_chars, 16_000);
        assert_eq!(cfg.state.backend, "memory");
        assert!(cfg.app_state.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.toml");
        std::fs::write(
            &path,
            r#"
[engine]
max_delegation_depth = 2

[model]
max_retries = 5

[state]
backend = "sqlite"
sqlite_path = "/tmp/hive-test.db"

[app_state]
product = "Hive"
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.engine.max_delegation_depth, 2);
        // 未给出的键取默认值
        assert_eq!(cfg.engine.max_tool_rounds, 8);
        assert_eq!(cfg.model.max_retries, 5);
        assert_eq!(cfg.state.backend, "sqlite");
        assert_eq!(cfg.app_state.get("product"), Some(&serde_json::json!("Hive")));
    }
}
