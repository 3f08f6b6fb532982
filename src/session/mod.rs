//! 会话与事件模型：事件、只追加日志、上下文派生、会话管理

pub mod context;
pub mod event;
pub mod log;
#[allow(clippy::module_inception)]
pub mod session;

pub use context::{derive_context, ContextEntry, ContextWindow, Role};
pub use event::{tool_actor, Event, EventKind, USER_ACTOR};
pub use log::{EventLog, Replay};
pub use session::{Session, SessionId, SessionManager};
