//! Per-browser session state.
//!
//! A [`Session`] is the explicit per-request handle onto one session's data.
//! Reads are served from the copy loaded by the session layer; every write
//! goes straight to the injected [`SessionStore`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub mod memory;
pub mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

pub const SESSION_COOKIE: &str = "cte_sid";

/// Who is logged in, as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: String,
}

/// Result of the latest successful admin-table lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedAdmin {
    pub email: String,
    pub name: Option<String>,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub identity: Option<Identity>,
    pub admin: Option<CachedAdmin>,
    pub oauth_state: Option<String>,
    #[serde(default)]
    pub admin_verified: bool,
    pub intended_admin_path: Option<String>,
}

impl SessionData {
    /// Replace the identity and drop everything derived from the previous one.
    pub fn log_in(&mut self, identity: Identity) {
        *self = SessionData {
            identity: Some(identity),
            ..SessionData::default()
        };
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> AppResult<Option<SessionData>>;
    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> AppResult<()>;
    async fn destroy(&self, id: &str) -> AppResult<()>;
}

/// 256 random bits, base64url encoded.
pub fn generate_session_id() -> AppResult<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal("session id generation failed".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Debug)]
struct SessionState {
    id: String,
    data: SessionData,
    /// The store holds a record for this id.
    persisted: bool,
    destroyed: bool,
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(
        id: String,
        store: Arc<dyn SessionStore>,
        ttl: Duration,
        loaded: Option<SessionData>,
    ) -> Self {
        let persisted = loaded.is_some();
        Self {
            store,
            ttl,
            state: Arc::new(Mutex::new(SessionState {
                id,
                data: loaded.unwrap_or_default(),
                persisted,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // A poisoned lock only means another clone panicked mid-read.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current id. Changes after [`Session::regenerate`].
    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn get(&self) -> SessionData {
        self.lock().data.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().data.identity.clone()
    }

    pub fn is_persisted(&self) -> bool {
        self.lock().persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub async fn set(&self, data: SessionData) -> AppResult<()> {
        self.store.save(&self.id(), &data, self.ttl).await?;
        let mut state = self.lock();
        state.data = data;
        state.persisted = true;
        state.destroyed = false;
        Ok(())
    }

    pub async fn update<F>(&self, f: F) -> AppResult<()>
    where
        F: FnOnce(&mut SessionData),
    {
        let mut data = self.get();
        f(&mut data);
        self.set(data).await
    }

    /// Store `data` under a fresh id and drop the old record, so a cookie
    /// issued before login never carries the logged-in identity.
    pub async fn regenerate(&self, data: SessionData) -> AppResult<()> {
        let new_id = generate_session_id()?;
        let (old_id, persisted) = {
            let state = self.lock();
            (state.id.clone(), state.persisted)
        };
        self.store.save(&new_id, &data, self.ttl).await?;
        if persisted {
            self.store.destroy(&old_id).await?;
        }
        let mut state = self.lock();
        state.id = new_id;
        state.data = data;
        state.persisted = true;
        state.destroyed = false;
        Ok(())
    }

    pub async fn destroy(&self) -> AppResult<()> {
        self.store.destroy(&self.id()).await?;
        let mut state = self.lock();
        state.data = SessionData::default();
        state.persisted = false;
        state.destroyed = true;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The id is a bearer credential.
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))
    }
}
