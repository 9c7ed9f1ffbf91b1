//! User-side registration: dashboards, registering, phone numbers, and the
//! admin action that removes a registration.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AppUser, CatalogItem, Program};
use crate::store::{PortalStore, StoreError};

/// Optional leading `+`, then 10 to 15 digits.
static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,15}$").unwrap());

/// Strip spaces and dashes and validate what is left.
pub fn normalize_phone(raw: &str) -> AppResult<String> {
    let compact: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !RE_PHONE.is_match(&compact) {
        return Err(AppError::InvalidInput("Invalid phone number".to_string()));
    }
    Ok(compact)
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDashboard {
    pub program: Program,
    pub user: Option<AppUser>,
    pub items: Vec<CatalogItem>,
    pub registered_ids: Vec<Uuid>,
    pub max_registrations: usize,
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn PortalStore>,
    /// Per-program cap, 0 for none.
    max_registrations: usize,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn PortalStore>, max_registrations: usize) -> Self {
        Self {
            store,
            max_registrations,
        }
    }

    pub async fn dashboard(
        &self,
        program: Program,
        user_id: &str,
        is_admin: bool,
    ) -> AppResult<UserDashboard> {
        let items = self.store.list_items(program).await?;
        let registered_ids = self.store.registered_item_ids(program, user_id).await?;
        let user = self.store.get_user(user_id).await?;
        Ok(UserDashboard {
            program,
            user,
            items,
            registered_ids,
            max_registrations: self.max_registrations,
            is_admin,
        })
    }

    pub async fn register(&self, program: Program, user_id: &str, item_id: Uuid) -> AppResult<()> {
        if self.store.get_item(program, item_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                program.item_noun(),
                item_id
            )));
        }

        let result = self
            .store
            .register_within(program, user_id, item_id, self.max_registrations)
            .await;
        match result {
            Ok(()) => {
                tracing::info!("{} registered for {} {}", user_id, program.item_noun(), item_id);
                Ok(())
            }
            Err(StoreError::Conflict(_)) => Err(AppError::Conflict(format!(
                "You are already registered for this {}",
                program.item_noun()
            ))),
            Err(StoreError::LimitReached(_)) => Err(AppError::InvalidInput(format!(
                "You can register for at most {} {}s",
                self.max_registrations,
                program.item_noun()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_phone(&self, user_id: &str, raw: &str) -> AppResult<String> {
        let phone = normalize_phone(raw)?;
        self.store.set_phone_number(user_id, &phone).await?;
        tracing::info!("phone number updated for {}", user_id);
        Ok(phone)
    }

    pub async fn unregister(
        &self,
        program: Program,
        user_id: &str,
        item_id: Uuid,
    ) -> AppResult<()> {
        self.store.unregister(program, user_id, item_id).await?;
        tracing::info!(
            "removed registration of {} for {} {}",
            user_id,
            program.item_noun(),
            item_id
        );
        Ok(())
    }
}
