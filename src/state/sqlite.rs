//! SQLite 状态后端（同步）
//!
//! 单表 state(namespace, key, value)，value 存 JSON 文本；user: 与会话状态可跨进程保留。

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::core::OrchestrationError;
use crate::state::StateBackend;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

fn backend_err(e: impl std::fmt::Display) -> OrchestrationError {
    OrchestrationError::Backend(e.to_string())
}

impl SqliteBackend {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OrchestrationError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(backend_err)?;
        }
        let conn = Connection::open(path).map_err(backend_err)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, OrchestrationError> {
        let conn = Connection::open_in_memory().map_err(backend_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, OrchestrationError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS state (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );",
        )
        .map_err(backend_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StateBackend for SqliteBackend {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, OrchestrationError> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM state WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(raw) => serde_json::from_str(&raw).map(Some).map_err(backend_err),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(backend_err(e)),
        }
    }

    fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<(), OrchestrationError> {
        let raw = serde_json::to_string(value).map_err(backend_err)?;
        self.conn
            .lock()
            .execute(
                "INSERT INTO state (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![namespace, key, raw, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(backend_err)?;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), OrchestrationError> {
        self.conn
            .lock()
            .execute(
                "DELETE FROM state WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .map_err(backend_err)?;
        Ok(())
    }

    fn keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>, OrchestrationError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT key FROM state WHERE namespace = ?1 ORDER BY key")
            .map_err(backend_err)?;
        let rows = stmt
            .query_map(params![namespace], |row| row.get::<_, String>(0))
            .map_err(backend_err)?;
        let mut keys = Vec::new();
        for key in rows {
            let key = key.map_err(backend_err)?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn clear(&self, namespace: &str) -> Result<(), OrchestrationError> {
        self.conn
            .lock()
            .execute("DELETE FROM state WHERE namespace = ?1", params![namespace])
            .map_err(backend_err)?;
        Ok(())
    }
}
