//! Agent：绑定模型、指令、工具集与子 Agent 的推理单元

pub mod definition;
pub mod router;
pub mod runner;
pub mod template;

pub use definition::{DelegationMode, LlmAgent, LlmAgentBuilder, SubAgent};
pub use router::{DelegateCandidate, DelegationRouter, NameMatchRouter};
pub use runner::{run_agent_turn, AgentTurn};
pub use template::render;
