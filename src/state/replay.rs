//! 由事件重建状态

use std::collections::BTreeMap;

use serde_json::Value;

use crate::session::{Event, EventKind};

/// 按序应用 StateMutation 事件，得到最终键值
///
/// 从 seq 0 回放无继承 user: 状态的会话日志时，结果与 StateHandle::snapshot 一致（app: 不经事件写入）。
pub fn reconstruct_state<'a, I>(events: I) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = &'a Event>,
{
    reconstruct_state_from(BTreeMap::new(), events)
}

/// 以会话开始时继承的状态（如此前会话写下的 user: 键）为基线回放
pub fn reconstruct_state_from<'a, I>(
    baseline: BTreeMap<String, Value>,
    events: I,
) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut state = baseline;
    for event in events {
        if event.kind != EventKind::StateMutation {
            continue;
        }
        let Some(key) = event.payload.get("key").and_then(Value::as_str) else {
            continue;
        };
        match event.payload.get("op").and_then(Value::as_str) {
            Some("set") => {
                let value = event.payload.get("value").cloned().unwrap_or(Value::Null);
                state.insert(key.to_string(), value);
            }
            Some("delete") => {
                state.remove(key);
            }
            _ => {}
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::EventLog;
    use crate::state::{StateHandle, StateStore};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_reconstruct_matches_live_state() {
        let store = Arc::new(StateStore::in_memory());
        let log = Arc::new(EventLog::new());
        let h = StateHandle::new(Arc::clone(&store), Arc::clone(&log), "s1", "u-replay")
            .scoped("a", "root.a");
        log.append(Event::user_message("hi"));
        h.set("x", json!(1)).unwrap();
        h.set("temp:y", json!({"k": [1, 2]})).unwrap();
        h.set("x", json!(2)).unwrap();
        h.set("user:z", json!("keep")).unwrap();
        h.delete("temp:y").unwrap();

        let rebuilt = reconstruct_state(&log.snapshot());
        assert_eq!(rebuilt, h.snapshot().unwrap());
        assert_eq!(rebuilt.get("x"), Some(&json!(2)));
        assert!(!rebuilt.contains_key("temp:y"));
    }

    #[test]
    fn test_baseline_carries_inherited_user_keys() {
        let store = Arc::new(StateStore::in_memory());
        let earlier = StateHandle::new(Arc::clone(&store), Arc::new(EventLog::new()), "s1", "dana");
        earlier.set("user:lang", json!("fr")).unwrap();

        let baseline = store.user_snapshot("dana").unwrap();
        let log = Arc::new(EventLog::new());
        let h = StateHandle::new(Arc::clone(&store), Arc::clone(&log), "s2", "dana");
        h.set("cart", json!(1)).unwrap();
        h.delete("user:lang").unwrap();
        h.set("user:theme", json!("dark")).unwrap();

        let events = log.snapshot();
        assert_ne!(reconstruct_state(&events), h.snapshot().unwrap());
        assert_eq!(reconstruct_state_from(baseline, &events), h.snapshot().unwrap());
    }
}
