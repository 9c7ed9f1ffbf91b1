//! Persistence for users, admins, catalog items and registrations.
//!
//! `PortalStore` is the seam between request handling and the relational
//! backend. The Postgres implementation is used in production; the in-memory
//! one backs local development and tests and enforces the same uniqueness
//! rules.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdminRecord, AppUser, CatalogItem, CatalogPatch, NewCatalogItem, NewUser, Program,
    RegistrationJoinRow,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("limit reached: {0}")]
    LimitReached(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A window of rows plus the exact number of rows behind it.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn upsert_user(&self, user: NewUser) -> StoreResult<AppUser>;
    async fn get_user(&self, id: &str) -> StoreResult<Option<AppUser>>;
    async fn set_phone_number(&self, id: &str, phone: &str) -> StoreResult<()>;
    /// Newest users first.
    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Page<AppUser>>;

    async fn find_admin(&self, email: &str) -> StoreResult<Option<AdminRecord>>;
    async fn list_admin_emails(&self) -> StoreResult<Vec<String>>;
    async fn add_admin(&self, email: &str) -> StoreResult<()>;
    async fn remove_admin(&self, email: &str) -> StoreResult<()>;

    async fn list_items(&self, program: Program) -> StoreResult<Vec<CatalogItem>>;
    async fn get_item(&self, program: Program, id: Uuid) -> StoreResult<Option<CatalogItem>>;
    async fn create_item(&self, program: Program, item: NewCatalogItem)
        -> StoreResult<CatalogItem>;
    async fn update_item(
        &self,
        program: Program,
        id: Uuid,
        patch: CatalogPatch,
    ) -> StoreResult<CatalogItem>;
    /// Registrations for the item go with it.
    async fn delete_item(&self, program: Program, id: Uuid) -> StoreResult<()>;

    async fn registered_item_ids(&self, program: Program, user_id: &str)
        -> StoreResult<Vec<Uuid>>;
    /// Fails with `Conflict` when the pair already exists.
    async fn register(&self, program: Program, user_id: &str, item_id: Uuid) -> StoreResult<()> {
        self.register_within(program, user_id, item_id, 0).await
    }
    /// Like `register`, but fails with `LimitReached` when the user already
    /// holds `limit` registrations in the program. The count and the insert
    /// are one atomic step. A `limit` of 0 means no cap.
    async fn register_within(
        &self,
        program: Program,
        user_id: &str,
        item_id: Uuid,
        limit: usize,
    ) -> StoreResult<()>;
    async fn unregister(&self, program: Program, user_id: &str, item_id: Uuid)
        -> StoreResult<()>;
    /// Registrations joined with users and items, optionally for one item.
    async fn roster_rows(
        &self,
        program: Program,
        item_id: Option<Uuid>,
    ) -> StoreResult<Vec<RegistrationJoinRow>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
