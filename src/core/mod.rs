//! 核心编排层：错误与恢复、回合状态、会话监管、任务调度、编排器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod state;
pub mod task_scheduler;

pub use builder::OrchestratorBuilder;
pub use error::{ErrorKind, OrchestrationError, RecoveryAction, TurnFailure};
pub use orchestrator::{Orchestrator, TurnResponse};
pub use recovery::RecoveryEngine;
pub use session_supervisor::SessionSupervisor;
pub use state::{TurnPhase, TurnStatus};
pub use task_scheduler::TaskScheduler;
