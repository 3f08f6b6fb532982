//! 回合状态定义：Agent 回合状态机阶段与回合终态
//!
//! 每个 Agent 回合按 Invoked → Reasoning → {Responding | RequestingTool | Delegating} → Completed 推进；
//! 顶层回合以 Completed / Failed / Cancelled 之一结束。

use serde::{Deserialize, Serialize};

/// Agent 回合阶段（用于日志与观测）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    Invoked,
    Reasoning,
    RequestingTool,
    Delegating,
    Responding,
    Completed,
}

impl TurnPhase {
    /// 状态机允许的迁移；RequestingTool 与 Consult 式 Delegating 会回到 Reasoning
    pub fn can_transition_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (Invoked, Reasoning)
                | (Reasoning, RequestingTool)
                | (Reasoning, Delegating)
                | (Reasoning, Responding)
                | (RequestingTool, Reasoning)
                | (Delegating, Reasoning)
                | (Delegating, Completed)
                | (Responding, Completed)
        )
    }
}

/// 顶层回合终态：取消与失败是不同的终态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    Completed,
    Failed,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_phase_transitions() {
        assert!(TurnPhase::Invoked.can_transition_to(TurnPhase::Reasoning));
        assert!(TurnPhase::RequestingTool.can_transition_to(TurnPhase::Reasoning));
        assert!(TurnPhase::Responding.can_transition_to(TurnPhase::Completed));
        assert!(!TurnPhase::Invoked.can_transition_to(TurnPhase::Responding));
        assert!(!TurnPhase::Completed.can_transition_to(TurnPhase::Reasoning));
    }
}
