//! 指令模板：用会话可见状态替换 {key} 与 {key?}
//!
//! 只匹配形如标识符（可带作用域前缀）的占位符，指令中的 JSON 花括号原样保留。
//! 缺失的必需键替换为空串并记录告警；{key?} 缺失时静默替换为空串。

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::state::StateHandle;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{((?:temp:|user:|app:)?[A-Za-z_][A-Za-z0-9_.]*)(\?)?\}")
            .expect("placeholder pattern")
    })
}

pub fn render(template: &str, state: &StateHandle) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            let optional = caps.get(2).is_some();
            match state.get(key) {
                Some(Value::String(s)) => s,
                Some(v) => v.to_string(),
                None => {
                    if !optional {
                        tracing::warn!(key, agent = state.actor(), "template key missing from state");
                    }
                    String::new()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::EventLog;
    use crate::state::StateStore;
    use serde_json::json;
    use std::sync::Arc;

    fn handle() -> StateHandle {
        let store = Arc::new(StateStore::in_memory());
        store.configure_app("product", json!("Hive")).unwrap();
        StateHandle::new(store, Arc::new(EventLog::new()), "s1", "u1").scoped("writer", "root")
    }

    #[test]
    fn test_substitutes_scoped_and_plain_keys() {
        let h = handle();
        h.set("topic", json!("ownership")).unwrap();
        h.set("user:level", json!(3)).unwrap();
        let out = render("Write about {topic} for {app:product} (level {user:level}).", &h);
        assert_eq!(out, "Write about ownership for Hive (level 3).");
    }

    #[test]
    fn test_missing_keys_render_empty() {
        let h = handle();
        assert_eq!(render("[{draft?}] [{draft}]", &h), "[] []");
    }

    #[test]
    fn test_json_braces_untouched() {
        let h = handle();
        let t = r#"Reply {"tool": "echo"} or { spaced }"#;
        assert_eq!(render(t, &h), t);
    }
}
