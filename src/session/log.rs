//! 事件日志：只追加、全序
//!
//! append 在同一把写锁内分配序号并入队，保证并发写入下序号严格递增且无空洞；
//! replay 返回惰性、有限（以创建时长度为界）、可重启的迭代器。

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::session::{Event, EventKind};

/// 单个会话的事件日志
#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加事件，返回分配的序号
    pub fn append(&self, mut event: Event) -> u64 {
        let mut events = self.events.write();
        let seq = events.len() as u64;
        event.seq = seq;
        event.timestamp = Utc::now();
        events.push(event);
        seq
    }

    /// 下一个将被分配的序号
    pub fn next_seq(&self) -> u64 {
        self.events.read().len() as u64
    }

    /// 最后已提交事件的序号；空日志返回 None
    pub fn last_seq(&self) -> Option<u64> {
        self.events.read().last().map(|e| e.seq)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn get(&self, seq: u64) -> Option<Event> {
        self.events.read().get(seq as usize).cloned()
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// from_seq（含）之后的事件
    pub fn since(&self, from_seq: u64) -> Vec<Event> {
        let events = self.events.read();
        events
            .get(from_seq as usize..)
            .map(|s| s.to_vec())
            .unwrap_or_default()
    }

    /// from_seq 之后是否出现过指定工具的调用（限定在 branch 子树内）
    pub fn has_tool_call_since(&self, from_seq: u64, tool: &str, branch: &str) -> bool {
        let events = self.events.read();
        events
            .get(from_seq as usize..)
            .unwrap_or_default()
            .iter()
            .any(|e| {
                e.kind == EventKind::ToolCall && e.tool_name() == Some(tool) && e.within_branch(branch)
            })
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.read().iter().map(|e| e.kind).collect()
    }

    /// 从 from_seq 开始回放；上界固定为调用时的日志长度
    pub fn replay(self: &Arc<Self>, from_seq: u64) -> Replay {
        Replay {
            log: Arc::clone(self),
            start: from_seq,
            cursor: from_seq,
            end: self.next_seq(),
        }
    }
}

/// 回放迭代器：逐条按需克隆事件，restart 后从起点重新开始
#[derive(Debug, Clone)]
pub struct Replay {
    log: Arc<EventLog>,
    start: u64,
    cursor: u64,
    end: u64,
}

impl Replay {
    pub fn restart(&mut self) {
        self.cursor = self.start;
    }

    /// 回放区间 [start, end)
    pub fn bounds(&self) -> (u64, u64) {
        (self.start, self.end)
    }
}

impl Iterator for Replay {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.cursor >= self.end {
            return None;
        }
        let event = self.log.get(self.cursor)?;
        self.cursor += 1;
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.cursor) as usize;
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_gapless_seq() {
        let log = EventLog::new();
        assert_eq!(log.last_seq(), None);
        assert_eq!(log.append(Event::user_message("a")), 0);
        assert_eq!(log.append(Event::agent_response("root", "b")), 1);
        assert_eq!(log.last_seq(), Some(1));
        assert_eq!(log.next_seq(), 2);
    }

    #[test]
    fn test_concurrent_appends_stay_gapless() {
        let log = Arc::new(EventLog::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        log.append(Event::user_message(&format!("{}-{}", i, j)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let seqs: Vec<u64> = log.snapshot().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..400).collect::<Vec<u64>>());
    }

    #[test]
    fn test_replay_is_bounded_and_restartable() {
        let log = Arc::new(EventLog::new());
        for i in 0..3 {
            log.append(Event::user_message(&i.to_string()));
        }
        let mut replay = log.replay(1);
        // 回放创建后的追加不可见
        log.append(Event::user_message("late"));

        let first: Vec<u64> = replay.by_ref().map(|e| e.seq).collect();
        assert_eq!(first, vec![1, 2]);
        assert!(replay.next().is_none());

        replay.restart();
        let again: Vec<u64> = replay.map(|e| e.seq).collect();
        assert_eq!(again, vec![1, 2]);
    }

    #[test]
    fn test_has_tool_call_since_respects_branch() {
        let log = EventLog::new();
        log.append(
            Event::tool_call("a", "c0", "exit_loop", &serde_json::json!({})).on_branch("root.other"),
        );
        let mark = log.next_seq();
        log.append(
            Event::tool_call("b", "c1", "exit_loop", &serde_json::json!({})).on_branch("root.loop.b"),
        );
        assert!(log.has_tool_call_since(mark, "exit_loop", "root.loop"));
        assert!(!log.has_tool_call_since(mark, "exit_loop", "root.other"));
        assert!(!log.has_tool_call_since(mark + 1, "exit_loop", "root.loop"));
    }
}
