//! 作用域状态：前缀决定可见性与生命周期，所有写入经事件日志

pub mod backend;
pub mod replay;
pub mod scope;
pub mod sqlite;
pub mod store;

pub use backend::{InMemoryBackend, StateBackend};
pub use replay::{reconstruct_state, reconstruct_state_from};
pub use scope::Scope;
pub use sqlite::SqliteBackend;
pub use store::{StateHandle, StateStore};
