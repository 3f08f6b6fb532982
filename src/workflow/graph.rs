//! Agent 树：配置期校验、按名索引与节点分支
//!
//! 校验：节点名非空且全树唯一、同一节点不重复挂载、output_key 不落在 app: 作用域、
//! 循环 max_iterations > 0、工具步骤参数符合工具 schema。

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::OrchestrationError;
use crate::state::Scope;
use crate::tools::validate_args;
use crate::workflow::Node;

pub struct AgentTree {
    root: Node,
    index: HashMap<String, Node>,
    /// 节点名 -> 父级的点分分支
    parent_branches: HashMap<String, String>,
}

fn node_ptr(node: &Node) -> *const () {
    match node {
        Node::Agent(a) => Arc::as_ptr(a) as *const (),
        Node::Sequential(n) => Arc::as_ptr(n) as *const (),
        Node::Parallel(n) => Arc::as_ptr(n) as *const (),
        Node::Loop(n) => Arc::as_ptr(n) as *const (),
        Node::Tool(n) => Arc::as_ptr(n) as *const (),
    }
}

fn invalid(msg: String) -> OrchestrationError {
    OrchestrationError::ConfigError(msg)
}

impl AgentTree {
    pub fn new(root: Node) -> Result<Self, OrchestrationError> {
        let mut tree = Self {
            root: root.clone(),
            index: HashMap::new(),
            parent_branches: HashMap::new(),
        };
        let mut seen = Vec::new();
        tree.visit(&root, "", &mut seen)?;
        Ok(tree)
    }

    fn visit(
        &mut self,
        node: &Node,
        parent_branch: &str,
        seen: &mut Vec<*const ()>,
    ) -> Result<(), OrchestrationError> {
        let name = node.name();
        if name.trim().is_empty() {
            return Err(invalid("node name must not be empty".into()));
        }
        let ptr = node_ptr(node);
        if seen.contains(&ptr) {
            return Err(invalid(format!("node '{}' is attached more than once", name)));
        }
        seen.push(ptr);
        if self.index.contains_key(name) {
            return Err(invalid(format!("duplicate node name '{}'", name)));
        }
        if let Some(key) = node.output_key() {
            if Scope::of(key) == Scope::App {
                return Err(invalid(format!(
                    "node '{}' writes output_key '{}' in read-only app scope",
                    name, key
                )));
            }
        }
        match node {
            Node::Loop(lp) if lp.max_iterations == 0 => {
                return Err(invalid(format!("loop '{}' needs max_iterations > 0", name)));
            }
            Node::Tool(step) => validate_args(step.tool.name(), &step.tool.parameters_schema(), &step.args)
                .map_err(|e| invalid(format!("tool step '{}': {}", name, e)))?,
            _ => {}
        }
        let branch = if parent_branch.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", parent_branch, name)
        };
        self.index.insert(name.to_string(), node.clone());
        self.parent_branches.insert(name.to_string(), parent_branch.to_string());
        for child in node.children() {
            self.visit(child, &branch, seen)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.index.get(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 节点父级的分支（根节点为空串）；恢复活动 Agent 时据此还原它原本的分支
    pub fn parent_branch(&self, name: &str) -> Option<&str> {
        self.parent_branches.get(name).map(String::as_str)
    }

    /// 该节点是否在回答后留在活动路径上
    pub fn keeps_active(&self, name: &str) -> bool {
        self.get(name).map(Node::keep_active).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LlmAgent;
    use crate::llm::{ModelResponse, ScriptedModel};
    use crate::tools::EchoTool;
    use crate::workflow::{tool_step, WorkflowBuilder};

    fn agent(name: &str) -> Arc<LlmAgent> {
        LlmAgent::builder(name, Arc::new(ScriptedModel::new(vec![ModelResponse::text("ok")]))).build()
    }

    #[test]
    fn test_index_covers_sub_agents_and_children() {
        let helpdesk = LlmAgent::builder("HelpDesk", Arc::new(ScriptedModel::new(vec![])))
            .sub_agent(agent("Billing"))
            .sub_agent(agent("Returns"))
            .build();
        let tree = AgentTree::new(WorkflowBuilder::new("root").then(helpdesk).sequential()).unwrap();
        assert_eq!(tree.len(), 4);
        assert!(tree.get("Returns").is_some());
        assert_eq!(tree.root().name(), "root");
        assert_eq!(tree.parent_branch("Returns"), Some("root.HelpDesk"));
        assert_eq!(tree.parent_branch("root"), Some(""));
        assert_eq!(tree.parent_branch("nobody"), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let tree = WorkflowBuilder::new("root").then(agent("a")).then(agent("a")).sequential();
        assert!(matches!(AgentTree::new(tree), Err(OrchestrationError::ConfigError(_))));
    }

    #[test]
    fn test_reused_node_rejected() {
        let shared = agent("shared");
        let tree = WorkflowBuilder::new("root")
            .then(Arc::clone(&shared))
            .then(shared)
            .parallel();
        let err = AgentTree::new(tree).err().unwrap();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_app_output_key_rejected() {
        let bad = LlmAgent::builder("w", Arc::new(ScriptedModel::new(vec![])))
            .output_key("app:summary")
            .build();
        assert!(AgentTree::new(Node::from(bad)).is_err());
    }

    #[test]
    fn test_zero_iteration_loop_rejected() {
        let lp = WorkflowBuilder::new("lp").then(agent("a")).looped(0);
        assert!(AgentTree::new(lp).is_err());
    }

    #[test]
    fn test_tool_step_args_checked() {
        let step = tool_step("say", Arc::new(EchoTool), serde_json::json!({"nope": 1}), None);
        assert!(AgentTree::new(step).is_err());
    }
}
