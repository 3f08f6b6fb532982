//! 编排错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：回合内错误转为结构化结果喂回 Agent（FeedBack），
//! 模型错误按退避重试（Retry），引擎级错误终止当前回合（Abort）。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::state::TurnStatus;

/// 编排过程中可能出现的错误（参数、超时、作用域越权、模型不可用、委派过深等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestrationError {
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Tool execution failed: {0}")]
    ToolFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 在执行上下文中写 `app:` 作用域
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Model unavailable after {attempts} attempt(s): {reason}")]
    ModelUnavailable { attempts: u32, reason: String },

    #[error("Tool loop exceeded: more than {0} reasoning rounds in one turn")]
    ToolLoopExceeded(usize),

    #[error("Delegation depth exceeded: max depth is {0}")]
    DelegationDepthExceeded(usize),

    #[error("Unknown delegation target: {0}")]
    UnknownAgent(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session busy: a turn is already in flight for {0}")]
    SessionBusy(String),

    #[error("State backend error: {0}")]
    Backend(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl OrchestrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::ToolTimeout(_) => ErrorKind::ToolTimeout,
            Self::ToolFailed(_) => ErrorKind::ToolFailed,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            Self::ToolLoopExceeded(_) => ErrorKind::ToolLoopExceeded,
            Self::DelegationDepthExceeded(_) => ErrorKind::DelegationDepthExceeded,
            Self::UnknownAgent(_) => ErrorKind::UnknownAgent,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::SessionBusy(_) => ErrorKind::SessionBusy,
            Self::Backend(_) => ErrorKind::Backend,
            Self::ConfigError(_) => ErrorKind::Config,
        }
    }
}

/// 错误种类（对外暴露的稳定标识，写入结构化结果与 TurnFailure）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArguments,
    ToolTimeout,
    ToolFailed,
    UnknownTool,
    PermissionDenied,
    ModelUnavailable,
    ToolLoopExceeded,
    DelegationDepthExceeded,
    UnknownAgent,
    Cancelled,
    SessionNotFound,
    SessionBusy,
    Backend,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "InvalidArguments",
            Self::ToolTimeout => "ToolTimeout",
            Self::ToolFailed => "ToolFailed",
            Self::UnknownTool => "UnknownTool",
            Self::PermissionDenied => "PermissionDenied",
            Self::ModelUnavailable => "ModelUnavailable",
            Self::ToolLoopExceeded => "ToolLoopExceeded",
            Self::DelegationDepthExceeded => "DelegationDepthExceeded",
            Self::UnknownAgent => "UnknownAgent",
            Self::Cancelled => "Cancelled",
            Self::SessionNotFound => "SessionNotFound",
            Self::SessionBusy => "SessionBusy",
            Self::Backend => "Backend",
            Self::Config => "Config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 暴露给会话调用方的致命错误：带关联 ID 与最后已提交的事件序号，便于恢复
#[derive(Error, Debug, Clone, Serialize)]
#[error("{kind} (correlation {correlation_id}, last committed seq {last_committed_seq:?}): {message}")]
pub struct TurnFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: String,
    pub last_committed_seq: Option<u64>,
    pub status: TurnStatus,
}

impl TurnFailure {
    pub fn new(
        err: &OrchestrationError,
        correlation_id: impl Into<String>,
        last_committed_seq: Option<u64>,
    ) -> Self {
        let status = if matches!(err, OrchestrationError::Cancelled) {
            TurnStatus::Cancelled
        } else {
            TurnStatus::Failed
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            correlation_id: correlation_id.into(),
            last_committed_seq,
            status,
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 转为结构化结果写回 Agent 上下文，由 Agent 自行推理与恢复
    FeedBack(serde_json::Value),
    /// 等待退避时间后重试（模型调用）
    Retry(Duration),
    /// 终止当前回合
    Abort,
}
