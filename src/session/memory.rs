use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionData, SessionStore};
use crate::error::AppResult;

/// Sessions held in process memory; lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, (SessionData, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> AppResult<Option<SessionData>> {
        let mut sessions = self.sessions.write().await;
        if let Some((data, expires_at)) = sessions.get(id) {
            if *expires_at > Instant::now() {
                return Ok(Some(data.clone()));
            }
        } else {
            return Ok(None);
        }
        sessions.remove(id);
        Ok(None)
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> AppResult<()> {
        self.sessions
            .write()
            .await
            .insert(id.to_string(), (data.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn destroy(&self, id: &str) -> AppResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let store = MemorySessionStore::new();
        store
            .save("sid", &SessionData::default(), Duration::ZERO)
            .await
            .unwrap();

        assert!(store.load("sid").await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemorySessionStore::new();
        let data = SessionData {
            oauth_state: Some("xyz".into()),
            ..Default::default()
        };
        store
            .save("sid", &data, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.load("sid").await.unwrap(), Some(data));
    }
}
