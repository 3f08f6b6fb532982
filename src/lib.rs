//! Hive - Rust 多智能体编排核心
//!
//! 模块划分：
//! - **agent**: LLM Agent 定义、指令模板、委派路由与回合状态机
//! - **artifacts**: 工件（二进制块）句柄与 BlobStore 抽象
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、回合状态、会话监管、任务调度、编排器
//! - **llm**: 推理协作者抽象、文本补全适配与 Mock
//! - **observability**: tracing 初始化
//! - **session**: 事件、只追加日志、上下文派生、会话管理
//! - **state**: 作用域状态存储、后端（内存 / SQLite）与事件重建
//! - **tools**: 工具 trait、注册表、调用器与内置工具
//! - **workflow**: Sequential / Parallel / Loop / Tool 节点与执行引擎

pub mod agent;
pub mod artifacts;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod session;
pub mod state;
pub mod tools;
pub mod workflow;

pub use crate::agent::LlmAgent;
pub use crate::core::{Orchestrator, OrchestratorBuilder, TurnFailure, TurnResponse};
pub use crate::workflow::{Node, WorkflowBuilder};
