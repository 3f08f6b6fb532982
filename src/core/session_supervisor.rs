//! 会话监管：生命周期、中断管理
//!
//! 会话持有根 CancellationToken（结束会话时取消），每个顶层回合派生一个子 token；
//! cancel 只取消当前回合，已提交的状态变更保留。

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// 会话级生命周期管理：根令牌与当前回合令牌
#[derive(Debug)]
pub struct SessionSupervisor {
    /// 会话结束时触发
    root: CancellationToken,
    /// 当前在途回合
    current: Mutex<Option<CancellationToken>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            current: Mutex::new(None),
        }
    }

    /// 开始新回合，返回该回合的取消令牌
    pub fn begin_turn(&self) -> CancellationToken {
        let token = self.root.child_token();
        *self.current.lock() = Some(token.clone());
        token
    }

    pub fn finish_turn(&self) {
        self.current.lock().take();
    }

    /// 取消当前回合；没有在途回合时返回 false
    pub fn cancel(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    /// 结束会话：取消根令牌（连带所有子令牌）
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_only_current_turn() {
        let sup = SessionSupervisor::new();
        assert!(!sup.cancel());

        let first = sup.begin_turn();
        assert!(sup.cancel());
        assert!(first.is_cancelled());
        sup.finish_turn();

        let second = sup.begin_turn();
        assert!(!second.is_cancelled());
        assert!(sup.is_running());
    }

    #[test]
    fn test_shutdown_cancels_children() {
        let sup = SessionSupervisor::new();
        let turn = sup.begin_turn();
        sup.shutdown();
        assert!(turn.is_cancelled());
        assert!(sup.is_shutdown());
    }
}
