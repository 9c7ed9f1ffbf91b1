// Object storage for catalog posters and handouts

pub mod gcs;
pub mod memory;
pub mod r2;

pub use gcs::GcsBackend;
pub use memory::MemoryBackend;
pub use r2::R2Backend;

use async_trait::async_trait;

use crate::error::AppResult;

/// Storage backend abstraction shared by R2, GCS and the in-memory backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload an object and return its public URL.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<String>;

    /// Delete an object. Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Base URL under which objects are publicly served, without a trailing slash.
    fn public_base(&self) -> &str;

    fn bucket(&self) -> &str;

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base().trim_end_matches('/'), key)
    }

    /// Object key for a URL produced by `public_url`, `None` for foreign URLs.
    fn key_for_url(&self, url: &str) -> Option<String> {
        let base = self.public_base().trim_end_matches('/');
        url.strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

/// Keep only characters that are safe in an object key.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
