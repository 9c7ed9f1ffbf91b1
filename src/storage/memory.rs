use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

use super::StorageBackend;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Process-local object store for development and tests.
#[derive(Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    public_base: String,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            public_base: public_base.into().trim_end_matches('/').to_string(),
            fail_deletes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every delete fail, as an unreachable bucket would.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<String> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        tracing::info!("memory upload: key={}, size={}", key, data.len());
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("memory delete failed: {}", key)));
        }
        if self.objects.write().await.remove(key).is_none() {
            tracing::debug!("memory delete of missing key ignored: key={}", key);
        }
        Ok(())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }

    fn bucket(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_delete() {
        let backend = MemoryBackend::new("memory://assets");
        let url = backend
            .upload("courses/posters/1_p.png", b"png", "image/png")
            .await
            .unwrap();
        assert_eq!(url, "memory://assets/courses/posters/1_p.png");
        assert_eq!(
            backend.get("courses/posters/1_p.png").await.unwrap().content_type,
            "image/png"
        );

        backend.delete("courses/posters/1_p.png").await.unwrap();
        assert!(backend.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let backend = MemoryBackend::new("memory://assets");
        backend.delete("nope").await.unwrap();
    }
}
