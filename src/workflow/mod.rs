//! 工作流组合：Sequential / Parallel / Loop / Tool 节点、调用上下文与执行引擎

pub mod builder;
pub mod context;
pub mod engine;
pub mod graph;
pub mod types;

pub use builder::{tool_step, WorkflowBuilder};
pub use context::{EngineSettings, InvocationContext, Runtime};
pub use engine::run_node;
pub use graph::AgentTree;
pub use types::{LoopNode, Node, Outcome, ParallelNode, SequentialNode, ToolNode};
