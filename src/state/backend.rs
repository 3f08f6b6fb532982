//! 状态后端抽象
//!
//! 键值按命名空间（app / user/<id> / session/<id> / temp/<id>）分区；
//! 进程内实现满足 temp: 与测试，持久化实现见 sqlite.rs。

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde_json::Value;

use crate::core::OrchestrationError;

/// 持久化状态后端接口
pub trait StateBackend: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, OrchestrationError>;

    fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<(), OrchestrationError>;

    fn delete(&self, namespace: &str, key: &str) -> Result<(), OrchestrationError>;

    /// 命名空间内以 prefix 开头的键（升序）
    fn keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>, OrchestrationError>;

    /// 删除整个命名空间
    fn clear(&self, namespace: &str) -> Result<(), OrchestrationError>;
}

/// 进程内后端
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for InMemoryBackend {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, OrchestrationError> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<(), OrchestrationError> {
        self.data
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), OrchestrationError> {
        if let Some(ns) = self.data.write().get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    fn keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>, OrchestrationError> {
        Ok(self
            .data
            .read()
            .get(namespace)
            .map(|ns| {
                ns.keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn clear(&self, namespace: &str) -> Result<(), OrchestrationError> {
        self.data.write().remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_isolated() {
        let b = InMemoryBackend::new();
        b.put("session/a", "x", &serde_json::json!(1)).unwrap();
        b.put("session/b", "x", &serde_json::json!(2)).unwrap();
        assert_eq!(b.get("session/a", "x").unwrap(), Some(serde_json::json!(1)));
        b.clear("session/a").unwrap();
        assert_eq!(b.get("session/a", "x").unwrap(), None);
        assert_eq!(b.get("session/b", "x").unwrap(), Some(serde_json::json!(2)));
    }

    #[test]
    fn test_keys_sorted_with_prefix() {
        let b = InMemoryBackend::new();
        for k in ["user:b", "user:a", "other"] {
            b.put("user/u1", k, &Value::Null).unwrap();
        }
        assert_eq!(b.keys("user/u1", "user:").unwrap(), vec!["user:a", "user:b"]);
        assert!(b.keys("user/u2", "").unwrap().is_empty());
    }
}
