//! 工作流构建器
//!
//! 提供流畅的 API 构建组合节点与工具步骤

use std::sync::Arc;

use serde_json::Value;

use crate::tools::{Tool, ToolRegistry};
use crate::workflow::types::*;

/// Sequential / Parallel / Loop 共用的构建器
pub struct WorkflowBuilder {
    name: String,
    description: String,
    children: Vec<Node>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            children: Vec::new(),
        }
    }

    /// 设置描述（作为委派候选时供路由匹配）
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// 添加子节点
    pub fn then(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn sequential(self) -> Node {
        SequentialNode {
            name: self.name,
            description: self.description,
            children: self.children,
        }
        .into()
    }

    pub fn parallel(self) -> Node {
        ParallelNode {
            name: self.name,
            description: self.description,
            children: self.children,
        }
        .into()
    }

    /// 循环节点；max_iterations 在树校验时要求大于 0
    pub fn looped(self, max_iterations: usize) -> Node {
        LoopNode {
            name: self.name,
            description: self.description,
            children: self.children,
            max_iterations,
        }
        .into()
    }
}

/// 工具步骤
pub fn tool_step(
    name: impl Into<String>,
    tool: Arc<dyn Tool>,
    args: Value,
    output_key: Option<&str>,
) -> Node {
    let mut registry = ToolRegistry::new();
    registry.register_arc(Arc::clone(&tool));
    ToolNode {
        name: name.into(),
        tool,
        args,
        output_key: output_key.map(str::to_string),
        registry,
    }
    .into()
}
