//! 工件：按名称存取的带 MIME 类型的二进制块
//!
//! 名称沿用状态键的前缀约定：`user:` 前缀归用户所有、跨会话保留，其余归会话所有，
//! 会话结束时删除。实际存储交给外部 BlobStore。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::OrchestrationError;
use crate::state::scope::USER_PREFIX;

/// 二进制块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub mime: String,
}

/// 外部二进制存储
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, data: Vec<u8>, mime: &str) -> Result<(), OrchestrationError>;

    async fn get(&self, path: &str) -> Result<Option<Blob>, OrchestrationError>;

    /// 以 prefix 开头的路径（升序）
    async fn list(&self, prefix: &str) -> Result<Vec<String>, OrchestrationError>;

    async fn delete(&self, path: &str) -> Result<(), OrchestrationError>;
}

/// 进程内 BlobStore
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Blob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, path: &str, data: Vec<u8>, mime: &str) -> Result<(), OrchestrationError> {
        self.blobs.write().await.insert(
            path.to_string(),
            Blob {
                data,
                mime: mime.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Blob>, OrchestrationError> {
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, OrchestrationError> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<(), OrchestrationError> {
        self.blobs.write().await.remove(path);
        Ok(())
    }
}

/// 会话视角的工件句柄
#[derive(Clone)]
pub struct ArtifactHandle {
    store: Arc<dyn BlobStore>,
    session_id: String,
    user_id: String,
}

impl ArtifactHandle {
    pub fn new(
        store: Arc<dyn BlobStore>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            user_id: user_id.into(),
        }
    }

    fn session_root(&self) -> String {
        format!("sessions/{}/", self.session_id)
    }

    fn user_root(&self) -> String {
        format!("users/{}/", self.user_id)
    }

    /// 工件名 -> 存储路径
    fn path_of(&self, name: &str) -> String {
        match name.strip_prefix(USER_PREFIX) {
            Some(rest) => format!("{}{}", self.user_root(), rest),
            None => format!("{}{}", self.session_root(), name),
        }
    }

    pub async fn save(&self, name: &str, data: Vec<u8>, mime: &str) -> Result<(), OrchestrationError> {
        tracing::debug!(artifact = name, bytes = data.len(), mime, "artifact saved");
        self.store.put(&self.path_of(name), data, mime).await
    }

    pub async fn load(&self, name: &str) -> Result<Option<Blob>, OrchestrationError> {
        self.store.get(&self.path_of(name)).await
    }

    pub async fn delete(&self, name: &str) -> Result<(), OrchestrationError> {
        self.store.delete(&self.path_of(name)).await
    }

    /// 会话可见的工件名（会话工件 + 带 user: 前缀的用户工件），升序
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, OrchestrationError> {
        let session_root = self.session_root();
        let user_root = self.user_root();
        let mut names: Vec<String> = self
            .store
            .list(&session_root)
            .await?
            .into_iter()
            .filter_map(|p| p.strip_prefix(&session_root).map(str::to_string))
            .collect();
        names.extend(
            self.store
                .list(&user_root)
                .await?
                .into_iter()
                .filter_map(|p| {
                    p.strip_prefix(&user_root)
                        .map(|rest| format!("{}{}", USER_PREFIX, rest))
                }),
        );
        names.retain(|n| n.starts_with(prefix));
        names.sort();
        Ok(names)
    }

    /// 删除本会话的全部工件
    pub async fn clear_session(&self) -> Result<(), OrchestrationError> {
        for path in self.store.list(&self.session_root()).await? {
            self.store.delete(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_artifacts_outlive_session() {
        let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let s1 = ArtifactHandle::new(Arc::clone(&store), "s1", "alice");
        s1.save("report.txt", b"draft".to_vec(), "text/plain").await.unwrap();
        s1.save("user:avatar.png", vec![1, 2, 3], "image/png").await.unwrap();

        assert_eq!(s1.list("").await.unwrap(), vec!["report.txt", "user:avatar.png"]);
        assert_eq!(s1.list("user:").await.unwrap(), vec!["user:avatar.png"]);

        s1.clear_session().await.unwrap();
        let s2 = ArtifactHandle::new(Arc::clone(&store), "s2", "alice");
        assert_eq!(s2.list("").await.unwrap(), vec!["user:avatar.png"]);
        let blob = s2.load("user:avatar.png").await.unwrap().unwrap();
        assert_eq!(blob.mime, "image/png");
        assert!(s2.load("report.txt").await.unwrap().is_none());
    }
}
