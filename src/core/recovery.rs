//! 错误恢复引擎
//!
//! 根据错误类型返回 RecoveryAction：回合内错误转为结构化结果喂回 Agent，
//! 模型错误在重试预算内按指数退避重试，其余终止当前回合。

use crate::core::{OrchestrationError, RecoveryAction};
use crate::llm::{LlmError, RetryConfig};
use crate::tools::normalize;

#[derive(Debug, Clone, Default)]
pub struct RecoveryEngine {
    retry: RetryConfig,
}

impl RecoveryEngine {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// 第 attempt 次（从 0 开始）模型调用失败后的动作
    pub fn on_model_error(&self, err: &LlmError, attempt: u32) -> RecoveryAction {
        if attempt < self.retry.max_retries {
            tracing::warn!(attempt, error = %err, "model call failed, retrying");
            RecoveryAction::Retry(self.retry.backoff_for(attempt))
        } else {
            RecoveryAction::Abort
        }
    }

    /// 回合内错误喂回 Agent，引擎级错误终止回合
    pub fn on_turn_error(&self, err: &OrchestrationError) -> RecoveryAction {
        match err {
            OrchestrationError::InvalidArguments { .. }
            | OrchestrationError::ToolTimeout(_)
            | OrchestrationError::ToolFailed(_)
            | OrchestrationError::UnknownTool(_)
            | OrchestrationError::PermissionDenied(_)
            | OrchestrationError::UnknownAgent(_) => {
                RecoveryAction::FeedBack(normalize(Err(err.clone())))
            }
            _ => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine() -> RecoveryEngine {
        RecoveryEngine::new(RetryConfig {
            max_retries: 2,
            base_backoff: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(1),
        })
    }

    #[test]
    fn test_model_error_retries_then_aborts() {
        let e = engine();
        let err = LlmError::Timeout;
        assert_eq!(e.on_model_error(&err, 0), RecoveryAction::Retry(Duration::from_millis(10)));
        assert_eq!(e.on_model_error(&err, 1), RecoveryAction::Retry(Duration::from_millis(20)));
        assert_eq!(e.on_model_error(&err, 2), RecoveryAction::Abort);
    }

    #[test]
    fn test_unknown_agent_fed_back() {
        let action = engine().on_turn_error(&OrchestrationError::UnknownAgent("Billing".into()));
        match action {
            RecoveryAction::FeedBack(v) => {
                assert_eq!(v["status"], "error");
                assert_eq!(v["error_kind"], "UnknownAgent");
            }
            other => panic!("expected FeedBack, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_errors_abort() {
        let e = engine();
        assert_eq!(e.on_turn_error(&OrchestrationError::Cancelled), RecoveryAction::Abort);
        assert_eq!(
            e.on_turn_error(&OrchestrationError::DelegationDepthExceeded(3)),
            RecoveryAction::Abort
        );
        assert_eq!(e.on_turn_error(&OrchestrationError::ToolLoopExceeded(8)), RecoveryAction::Abort);
    }
}
