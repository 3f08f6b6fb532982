//! 委派路由：从候选子 Agent 中为模型给出的目标 / 需求选一个
//!
//! 路由可插拔，测试中用确定性的桩路由替换。

use std::collections::HashSet;

use serde::Serialize;

use crate::agent::DelegationMode;

/// 委派候选
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegateCandidate {
    pub name: String,
    pub description: String,
    pub mode: DelegationMode,
}

pub trait DelegationRouter: Send + Sync {
    /// 返回选中候选的名称；无法解析时返回 None
    fn choose(&self, candidates: &[DelegateCandidate], request: &str) -> Option<String>;
}

/// 默认路由：先按名称（忽略大小写）精确匹配，再按描述关键词重合度
#[derive(Debug, Default, Clone)]
pub struct NameMatchRouter;

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

impl DelegationRouter for NameMatchRouter {
    fn choose(&self, candidates: &[DelegateCandidate], request: &str) -> Option<String> {
        let request = request.trim();
        if let Some(c) = candidates
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(request))
        {
            return Some(c.name.clone());
        }

        let wanted = words(request);
        let mut best: Option<(&DelegateCandidate, usize)> = None;
        for c in candidates {
            let mut have = words(&c.description);
            have.extend(words(&c.name));
            let score = wanted.intersection(&have).count();
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((c, score));
            }
        }
        best.map(|(c, _)| c.name.clone())
    }
}
