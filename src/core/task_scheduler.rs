//! 任务调度：工具执行池
//!
//! 同一回合内的多个工具调用并发执行，由 Semaphore 限制同时运行的数量；
//! 许可在调用结束（含超时、取消）时随 guard 释放。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::OrchestrationError;

pub struct TaskScheduler {
    /// 工具并发限制
    tool_semaphore: Arc<Semaphore>,
    max_concurrent_tools: usize,
}

impl TaskScheduler {
    pub fn new(max_concurrent_tools: usize) -> Self {
        let max = max_concurrent_tools.max(1);
        Self {
            tool_semaphore: Arc::new(Semaphore::new(max)),
            max_concurrent_tools: max,
        }
    }

    /// 获取工具执行许可
    pub async fn acquire_tool(&self) -> Result<OwnedSemaphorePermit, OrchestrationError> {
        Arc::clone(&self.tool_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| OrchestrationError::Cancelled)
    }

    pub fn available_tool_slots(&self) -> usize {
        self.tool_semaphore.available_permits()
    }

    pub fn max_concurrent_tools(&self) -> usize {
        self.max_concurrent_tools
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_bounded_and_released() {
        let sched = TaskScheduler::new(2);
        let a = sched.acquire_tool().await.unwrap();
        let _b = sched.acquire_tool().await.unwrap();
        assert_eq!(sched.available_tool_slots(), 0);
        drop(a);
        assert_eq!(sched.available_tool_slots(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_still_grants_one_slot() {
        let sched = TaskScheduler::new(0);
        assert_eq!(sched.max_concurrent_tools(), 1);
        let _only = sched.acquire_tool().await.unwrap();
        assert_eq!(sched.available_tool_slots(), 0);
    }
}
