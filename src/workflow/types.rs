//! 工作流类型定义
//!
//! 可执行节点是带标签的变体：Agent 负责推理，Sequential / Parallel / Loop 只控制子节点次序，
//! Tool 是固定参数的确定性工具步骤。所有节点统一产出 Outcome。

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::agent::LlmAgent;
use crate::tools::{Tool, ToolRegistry};

/// 可执行节点；内部均为 Arc，克隆廉价
#[derive(Clone, Debug)]
pub enum Node {
    Agent(Arc<LlmAgent>),
    Sequential(Arc<SequentialNode>),
    Parallel(Arc<ParallelNode>),
    Loop(Arc<LoopNode>),
    Tool(Arc<ToolNode>),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Agent(a) => &a.name,
            Node::Sequential(n) => &n.name,
            Node::Parallel(n) => &n.name,
            Node::Loop(n) => &n.name,
            Node::Tool(n) => &n.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Node::Agent(a) => &a.description,
            Node::Sequential(n) => &n.description,
            Node::Parallel(n) => &n.description,
            Node::Loop(n) => &n.description,
            Node::Tool(n) => n.tool.description(),
        }
    }

    /// 直接子节点：工作流子节点或 Agent 的子 Agent
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Agent(a) => a.sub_agents.iter().map(|s| &s.node).collect(),
            Node::Sequential(n) => n.children.iter().collect(),
            Node::Parallel(n) => n.children.iter().collect(),
            Node::Loop(n) => n.children.iter().collect(),
            Node::Tool(_) => Vec::new(),
        }
    }

    pub fn output_key(&self) -> Option<&str> {
        match self {
            Node::Agent(a) => a.output_key.as_deref(),
            Node::Tool(n) => n.output_key.as_deref(),
            _ => None,
        }
    }

    pub fn keep_active(&self) -> bool {
        matches!(self, Node::Agent(a) if a.keep_active)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Agent(_) => "agent",
            Node::Sequential(_) => "sequential",
            Node::Parallel(_) => "parallel",
            Node::Loop(_) => "loop",
            Node::Tool(_) => "tool",
        }
    }
}

impl From<Arc<LlmAgent>> for Node {
    fn from(agent: Arc<LlmAgent>) -> Self {
        Node::Agent(agent)
    }
}

impl From<SequentialNode> for Node {
    fn from(node: SequentialNode) -> Self {
        Node::Sequential(Arc::new(node))
    }
}

impl From<ParallelNode> for Node {
    fn from(node: ParallelNode) -> Self {
        Node::Parallel(Arc::new(node))
    }
}

impl From<LoopNode> for Node {
    fn from(node: LoopNode) -> Self {
        Node::Loop(Arc::new(node))
    }
}

impl From<ToolNode> for Node {
    fn from(node: ToolNode) -> Self {
        Node::Tool(Arc::new(node))
    }
}

/// 按声明顺序执行子节点
#[derive(Debug)]
pub struct SequentialNode {
    pub name: String,
    pub description: String,
    pub children: Vec<Node>,
}

/// 并发执行子节点（fork/join）
///
/// 不同键的写入互不影响；多个子节点写同一个键时按完成顺序后写覆盖，结果不作保证。
#[derive(Debug)]
pub struct ParallelNode {
    pub name: String,
    pub description: String,
    pub children: Vec<Node>,
}

/// 重复执行子节点，直到终止工具被调用或达到 max_iterations
#[derive(Debug)]
pub struct LoopNode {
    pub name: String,
    pub description: String,
    pub children: Vec<Node>,
    pub max_iterations: usize,
}

/// 固定参数的工具步骤；错误结果视为未恢复的失败
pub struct ToolNode {
    pub name: String,
    pub tool: Arc<dyn Tool>,
    pub args: Value,
    pub output_key: Option<String>,
    /// 只含 tool 的注册表，供 ToolInvoker 查找
    pub(crate) registry: ToolRegistry,
}

impl std::fmt::Debug for ToolNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolNode")
            .field("name", &self.name)
            .field("tool", &self.tool.name())
            .field("args", &self.args)
            .field("output_key", &self.output_key)
            .finish()
    }
}

/// 节点执行结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outcome {
    /// 产出该结果的节点名
    pub author: String,
    /// 最终文本输出（Agent 的回答、工具步骤的结果 JSON、组合节点汇总的子输出）
    pub output: Option<String>,
    /// Loop 实际执行的迭代次数
    pub iterations: usize,
    /// Loop 因用尽迭代次数而结束
    pub max_iterations_reached: bool,
    /// Loop 因终止工具而提前结束
    pub escalated: bool,
    pub children: Vec<Outcome>,
}

impl Outcome {
    pub fn leaf(author: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn composite(author: impl Into<String>, children: Vec<Outcome>) -> Self {
        Self {
            author: author.into(),
            children,
            ..Self::default()
        }
    }

    /// 深度优先查找某个节点的结果
    pub fn find(&self, author: &str) -> Option<&Outcome> {
        if self.author == author {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(author))
    }
}
