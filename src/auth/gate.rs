//! Admin access gate.
//!
//! Two policies are available: a static allow-list from configuration and a
//! lookup in the persisted admin table. Both answer 401 for a caller without
//! an email, 403 for a caller who is not an admin, and pass backend failures
//! through as 500.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::AdminInfo;
use crate::error::{AppError, AppResult};
use crate::session::{CachedAdmin, Session};
use crate::store::PortalStore;

const ADMINS_ONLY: &str = "Forbidden: Admins only";

#[async_trait]
pub trait AdminGate: Send + Sync {
    async fn authorize(&self, session: &Session) -> AppResult<AdminInfo>;
}

fn caller_email(session: &Session) -> AppResult<String> {
    session
        .identity()
        .and_then(|identity| identity.email)
        .filter(|email| !email.is_empty())
        .ok_or(AppError::Unauthenticated)
}

/// Whether the caller is an admin, for pages that only show a flag.
/// Backend failures still propagate.
pub async fn is_admin(gate: &dyn AdminGate, session: &Session) -> AppResult<bool> {
    match gate.authorize(session).await {
        Ok(_) => Ok(true),
        Err(AppError::Unauthenticated) | Err(AppError::Forbidden(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Admins listed in configuration. Exact, case-sensitive match.
#[derive(Debug, Clone)]
pub struct AllowListGate {
    emails: Vec<String>,
}

impl AllowListGate {
    pub fn new(emails: Vec<String>) -> Self {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl AdminGate for AllowListGate {
    async fn authorize(&self, session: &Session) -> AppResult<AdminInfo> {
        let email = caller_email(session)?;
        if !self.emails.iter().any(|e| *e == email) {
            return Err(AppError::Forbidden(ADMINS_ONLY.to_string()));
        }
        Ok(AdminInfo { email, name: None })
    }
}

/// Admins stored in the admin table. Membership is looked up on every
/// request; the session only keeps the last result for display.
#[derive(Clone)]
pub struct AdminTableGate {
    store: Arc<dyn PortalStore>,
}

impl AdminTableGate {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AdminGate for AdminTableGate {
    async fn authorize(&self, session: &Session) -> AppResult<AdminInfo> {
        let email = caller_email(session)?;

        let record = self.store.find_admin(&email).await.map_err(|e| {
            tracing::error!("admin lookup failed for {}: {:#}", email, e);
            AppError::from(e)
        })?;

        let cached = session.get().admin;
        let record = match record {
            Some(record) => record,
            None => {
                tracing::warn!("non-admin {} denied", email);
                if cached.is_some() {
                    session.update(|data| data.admin = None).await?;
                }
                return Err(AppError::Forbidden(ADMINS_ONLY.to_string()));
            }
        };

        let unchanged = cached
            .as_ref()
            .is_some_and(|c| c.email == record.email && c.name == record.name);
        if !unchanged {
            let memo = CachedAdmin {
                email: record.email.clone(),
                name: record.name.clone(),
                cached_at: Utc::now(),
            };
            session.update(|data| data.admin = Some(memo)).await?;
        }

        Ok(AdminInfo {
            email: record.email,
            name: record.name,
        })
    }
}
