//! In-memory `PortalStore`.
//!
//! Not durable. State lives behind one `tokio::sync::RwLock`; mutations take
//! the write lock, so the registration uniqueness check and insert are atomic
//! within the process, mirroring the primary key in Postgres.
//!
//! `set_unavailable(true)` makes every call fail the way an unreachable
//! backend would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, PortalStore, StoreError, StoreResult};
use crate::models::{
    AdminRecord, AppUser, CatalogItem, CatalogPatch, NewCatalogItem, NewUser, Program,
    RegistrationJoinRow,
};

#[derive(Debug, Clone)]
struct RegistrationRecord {
    program: Program,
    user_id: String,
    item_id: Uuid,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // Insertion order doubles as creation order.
    users: Vec<AppUser>,
    admins: Vec<AdminRecord>,
    items: Vec<CatalogItem>,
    registrations: Vec<RegistrationRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seeds an admin with a display name, bypassing the promote path.
    pub async fn seed_admin(&self, email: &str, name: Option<&str>) {
        let mut state = self.state.write().await;
        state.admins.retain(|a| a.email != email);
        state.admins.push(AdminRecord {
            email: email.to_string(),
            name: name.map(str::to_string),
        });
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "in-memory store marked unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PortalStore for InMemoryStore {
    async fn upsert_user(&self, user: NewUser) -> StoreResult<AppUser> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if let Some(existing) = state.users.iter_mut().find(|u| u.id == user.id) {
            existing.email = user.email;
            existing.display_name = user.display_name;
            return Ok(existing.clone());
        }
        let created = AppUser {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            phone_number: None,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<AppUser>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn set_phone_number(&self, id: &str, phone: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;
        user.phone_number = Some(phone.to_string());
        Ok(())
    }

    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Page<AppUser>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut users: Vec<AppUser> = state.users.iter().rev().cloned().collect();
        // Stable sort keeps later inserts first among equal timestamps.
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = users.len() as u64;
        let items = users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn find_admin(&self, email: &str) -> StoreResult<Option<AdminRecord>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.admins.iter().find(|a| a.email == email).cloned())
    }

    async fn list_admin_emails(&self) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.admins.iter().map(|a| a.email.clone()).collect())
    }

    async fn add_admin(&self, email: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.admins.iter().any(|a| a.email == email) {
            return Err(StoreError::Conflict(format!("{} is already an admin", email)));
        }
        state.admins.push(AdminRecord {
            email: email.to_string(),
            name: None,
        });
        Ok(())
    }

    async fn remove_admin(&self, email: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.admins.len();
        state.admins.retain(|a| a.email != email);
        if state.admins.len() == before {
            return Err(StoreError::NotFound(format!("{} is not an admin", email)));
        }
        Ok(())
    }

    async fn list_items(&self, program: Program) -> StoreResult<Vec<CatalogItem>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .items
            .iter()
            .filter(|i| i.program == program)
            .cloned()
            .collect())
    }

    async fn get_item(&self, program: Program, id: Uuid) -> StoreResult<Option<CatalogItem>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .items
            .iter()
            .find(|i| i.program == program && i.id == id)
            .cloned())
    }

    async fn create_item(
        &self,
        program: Program,
        item: NewCatalogItem,
    ) -> StoreResult<CatalogItem> {
        self.check_available()?;
        let created = CatalogItem {
            id: Uuid::new_v4(),
            program,
            name: item.name,
            description: item.description,
            poster_url: item.poster_url,
            handout_url: item.handout_url,
            created_at: Utc::now(),
        };
        self.state.write().await.items.push(created.clone());
        Ok(created)
    }

    async fn update_item(
        &self,
        program: Program,
        id: Uuid,
        patch: CatalogPatch,
    ) -> StoreResult<CatalogItem> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let item = state
            .items
            .iter_mut()
            .find(|i| i.program == program && i.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", program.item_noun(), id)))?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn delete_item(&self, program: Program, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.items.len();
        state.items.retain(|i| !(i.program == program && i.id == id));
        if state.items.len() == before {
            return Err(StoreError::NotFound(format!("{} {}", program.item_noun(), id)));
        }
        state.registrations.retain(|r| r.item_id != id);
        Ok(())
    }

    async fn registered_item_ids(
        &self,
        program: Program,
        user_id: &str,
    ) -> StoreResult<Vec<Uuid>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .registrations
            .iter()
            .filter(|r| r.program == program && r.user_id == user_id)
            .map(|r| r.item_id)
            .collect())
    }

    async fn register_within(
        &self,
        program: Program,
        user_id: &str,
        item_id: Uuid,
        limit: usize,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }
        if !state
            .items
            .iter()
            .any(|i| i.program == program && i.id == item_id)
        {
            return Err(StoreError::NotFound(format!(
                "{} {}",
                program.item_noun(),
                item_id
            )));
        }
        if state
            .registrations
            .iter()
            .any(|r| r.user_id == user_id && r.item_id == item_id)
        {
            return Err(StoreError::Conflict(format!(
                "user {} already registered for {}",
                user_id, item_id
            )));
        }
        if limit > 0 {
            let held = state
                .registrations
                .iter()
                .filter(|r| r.program == program && r.user_id == user_id)
                .count();
            if held >= limit {
                return Err(StoreError::LimitReached(format!(
                    "user {} holds {} registrations",
                    user_id, held
                )));
            }
        }
        state.registrations.push(RegistrationRecord {
            program,
            user_id: user_id.to_string(),
            item_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn unregister(&self, program: Program, user_id: &str, item_id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.registrations.len();
        state
            .registrations
            .retain(|r| !(r.program == program && r.user_id == user_id && r.item_id == item_id));
        if state.registrations.len() == before {
            return Err(StoreError::NotFound(format!(
                "registration of {} for {}",
                user_id, item_id
            )));
        }
        Ok(())
    }

    async fn roster_rows(
        &self,
        program: Program,
        item_id: Option<Uuid>,
    ) -> StoreResult<Vec<RegistrationJoinRow>> {
        self.check_available()?;
        let state = self.state.read().await;
        let rows = state
            .registrations
            .iter()
            .filter(|r| r.program == program && item_id.map_or(true, |id| r.item_id == id))
            .filter_map(|r| {
                let user = state.users.iter().find(|u| u.id == r.user_id)?;
                let item = state.items.iter().find(|i| i.id == r.item_id)?;
                Some(RegistrationJoinRow {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    display_name: Some(user.display_name.clone()).filter(|n| !n.is_empty()),
                    phone_number: user.phone_number.clone(),
                    item_id: item.id,
                    item_name: item.name.clone(),
                })
            })
            .collect();
        Ok(rows)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.check_available()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
