use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::{SessionData, SessionStore};
use crate::error::{AppError, AppResult};

/// Sessions in the `sessions` table, keyed by the SHA-256 of the cookie value.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove expired rows. Returns how many were deleted.
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("purge sessions: {}", e)))?;
        Ok(result.rows_affected())
    }
}

fn hash_id(id: &str) -> String {
    Sha256::digest(id.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> AppResult<Option<SessionData>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM sessions WHERE id_hash = $1 AND expires_at > now()")
                .bind(hash_id(id))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::Database(format!("load session: {}", e)))?;

        match row {
            None => Ok(None),
            Some((raw,)) => match serde_json::from_str(&raw) {
                Ok(data) => Ok(Some(data)),
                Err(e) => {
                    // Treat an unreadable record as no session.
                    tracing::warn!("discarding undecodable session: {}", e);
                    Ok(None)
                }
            },
        }
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> AppResult<()> {
        let raw = serde_json::to_string(data)
            .map_err(|e| AppError::Internal(format!("encode session: {}", e)))?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Internal(format!("session ttl: {}", e)))?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            "INSERT INTO sessions (id_hash, data, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (id_hash) DO UPDATE SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at",
        )
        .bind(hash_id(id))
        .bind(raw)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("save session: {}", e)))?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id_hash = $1")
            .bind(hash_id(id))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("destroy session: {}", e)))?;
        Ok(())
    }
}
