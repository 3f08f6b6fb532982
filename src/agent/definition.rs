//! LLM Agent 定义
//!
//! 配置期构造、构造后不可变，经 Arc 在会话间共享。子节点分两种挂载方式：
//! sub_agent（协调者模式，移交后父回合结束）与 consultant（专家模式，咨询完成后父 Agent 继续推理）。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::DelegateCandidate;
use crate::llm::ModelClient;
use crate::tools::{Tool, ToolRegistry};
use crate::workflow::Node;

/// 委派方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationMode {
    /// 控制权移交给目标，父回合结束
    Handoff,
    /// 父 Agent 挂起，目标完成后带着其回答恢复推理
    Consult,
}

impl DelegationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handoff => "handoff",
            Self::Consult => "consult",
        }
    }
}

/// 挂在 Agent 下的子节点
#[derive(Clone)]
pub struct SubAgent {
    pub node: Node,
    pub mode: DelegationMode,
}

pub struct LlmAgent {
    pub name: String,
    pub description: String,
    /// 指令模板，支持 {key} / {key?}
    pub instruction: String,
    pub model: Arc<dyn ModelClient>,
    pub tools: ToolRegistry,
    pub sub_agents: Vec<SubAgent>,
    pub output_key: Option<String>,
    /// 回答后仍留在会话活动路径上，下一条输入直接交给它
    pub keep_active: bool,
}

impl LlmAgent {
    pub fn builder(name: impl Into<String>, model: Arc<dyn ModelClient>) -> LlmAgentBuilder {
        LlmAgentBuilder {
            agent: LlmAgent {
                name: name.into(),
                description: String::new(),
                instruction: String::new(),
                model,
                tools: ToolRegistry::new(),
                sub_agents: Vec::new(),
                output_key: None,
                keep_active: false,
            },
        }
    }

    /// 委派候选（按声明顺序）
    pub fn candidates(&self) -> Vec<DelegateCandidate> {
        self.sub_agents
            .iter()
            .map(|s| DelegateCandidate {
                name: s.node.name().to_string(),
                description: s.node.description().to_string(),
                mode: s.mode,
            })
            .collect()
    }

    pub fn sub_agent(&self, name: &str) -> Option<&SubAgent> {
        self.sub_agents.iter().find(|s| s.node.name() == name)
    }
}

impl fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmAgent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field(
                "sub_agents",
                &self.sub_agents.iter().map(|s| s.node.name()).collect::<Vec<_>>(),
            )
            .field("output_key", &self.output_key)
            .field("keep_active", &self.keep_active)
            .finish()
    }
}

/// LlmAgent 构建器
pub struct LlmAgentBuilder {
    agent: LlmAgent,
}

impl LlmAgentBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.agent.description = description.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.agent.instruction = instruction.into();
        self
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.agent.tools.register(tool);
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.agent.tools.register_arc(tool);
        self
    }

    /// 协调者模式子 Agent
    pub fn sub_agent(mut self, node: impl Into<Node>) -> Self {
        self.agent.sub_agents.push(SubAgent {
            node: node.into(),
            mode: DelegationMode::Handoff,
        });
        self
    }

    /// 专家模式子 Agent
    pub fn consultant(mut self, node: impl Into<Node>) -> Self {
        self.agent.sub_agents.push(SubAgent {
            node: node.into(),
            mode: DelegationMode::Consult,
        });
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.agent.output_key = Some(key.into());
        self
    }

    pub fn keep_active(mut self, keep: bool) -> Self {
        self.agent.keep_active = keep;
        self
    }

    pub fn build(self) -> Arc<LlmAgent> {
        Arc::new(self.agent)
    }
}
