//! Promote and demote administrators.

use std::sync::Arc;

use crate::auth::AdminInfo;
use crate::error::{AppError, AppResult};
use crate::store::{PortalStore, StoreError};

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn PortalStore>,
}

fn required_email(raw: &str) -> AppResult<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(AppError::InvalidInput("Email is required".to_string()));
    }
    Ok(email.to_string())
}

impl AdminService {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self { store }
    }

    pub async fn promote(&self, caller: &AdminInfo, email: &str) -> AppResult<()> {
        let email = required_email(email)?;
        match self.store.add_admin(&email).await {
            Ok(()) => {
                tracing::info!("{} promoted {} to admin", caller.email, email);
                Ok(())
            }
            Err(StoreError::Conflict(_)) => {
                Err(AppError::Conflict(format!("{} is already an admin", email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn demote(&self, caller: &AdminInfo, email: &str) -> AppResult<()> {
        let email = required_email(email)?;
        if email == caller.email {
            return Err(AppError::InvalidInput(
                "You cannot demote yourself".to_string(),
            ));
        }
        self.store.remove_admin(&email).await?;
        tracing::info!("{} demoted {}", caller.email, email);
        Ok(())
    }
}
