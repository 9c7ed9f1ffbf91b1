use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{Page, PortalStore, StoreError, StoreResult};
use crate::models::{
    AdminRecord, AppUser, CatalogItem, CatalogPatch, NewCatalogItem, NewUser, Program,
    RegistrationJoinRow,
};

const USER_COLUMNS: &str = "id, email, display_name, phone_number, created_at";
const ITEM_COLUMNS: &str =
    "id, program, name, description, poster_url, handout_url, created_at";

#[derive(FromRow)]
struct CatalogItemRow {
    id: Uuid,
    program: String,
    name: String,
    description: String,
    poster_url: Option<String>,
    handout_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CatalogItemRow> for CatalogItem {
    type Error = StoreError;

    fn try_from(row: CatalogItemRow) -> Result<Self, Self::Error> {
        let program = row
            .program
            .parse::<Program>()
            .map_err(|e: String| StoreError::Unexpected(anyhow::anyhow!(e)))?;
        Ok(CatalogItem {
            id: row.id,
            program,
            name: row.name,
            description: row.description,
            poster_url: row.poster_url,
            handout_url: row.handout_url,
            created_at: row.created_at,
        })
    }
}

/// Translates constraint violations into the store's error classes.
fn map_db_error(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(what.to_string());
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound(what.to_string());
        }
    }
    StoreError::Unexpected(anyhow::Error::new(e).context(what.to_string()))
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Opens a pool shared by the store and the session store.
    pub async fn connect(database_url: &str) -> StoreResult<PgPool> {
        PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unexpected(anyhow::Error::new(e).context("connect")))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(anyhow::Error::new(e).context("migrations")))
    }
}

#[async_trait]
impl PortalStore for PgStore {
    async fn upsert_user(&self, user: NewUser) -> StoreResult<AppUser> {
        sqlx::query_as::<_, AppUser>(&format!(
            "INSERT INTO users (id, email, display_name) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, display_name = EXCLUDED.display_name
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "upsert user"))
    }

    async fn get_user(&self, id: &str) -> StoreResult<Option<AppUser>> {
        sqlx::query_as::<_, AppUser>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "get user"))
    }

    async fn set_phone_number(&self, id: &str, phone: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET phone_number = $2 WHERE id = $1")
            .bind(id)
            .bind(phone)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "set phone number"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Page<AppUser>> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "count users"))?;

        let items = sqlx::query_as::<_, AppUser>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "list users"))?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn find_admin(&self, email: &str) -> StoreResult<Option<AdminRecord>> {
        sqlx::query_as::<_, AdminRecord>("SELECT email, name FROM admins WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "find admin"))
    }

    async fn list_admin_emails(&self) -> StoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT email FROM admins ORDER BY email")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "list admins"))
    }

    async fn add_admin(&self, email: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO admins (email) VALUES ($1)")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, &format!("{} is already an admin", email)))?;
        Ok(())
    }

    async fn remove_admin(&self, email: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM admins WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "remove admin"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} is not an admin", email)));
        }
        Ok(())
    }

    async fn list_items(&self, program: Program) -> StoreResult<Vec<CatalogItem>> {
        let rows = sqlx::query_as::<_, CatalogItemRow>(&format!(
            "SELECT {} FROM catalog_items WHERE program = $1 ORDER BY created_at, name",
            ITEM_COLUMNS
        ))
        .bind(program.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "list catalog items"))?;

        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn get_item(&self, program: Program, id: Uuid) -> StoreResult<Option<CatalogItem>> {
        let row = sqlx::query_as::<_, CatalogItemRow>(&format!(
            "SELECT {} FROM catalog_items WHERE program = $1 AND id = $2",
            ITEM_COLUMNS
        ))
        .bind(program.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "get catalog item"))?;

        row.map(CatalogItem::try_from).transpose()
    }

    async fn create_item(
        &self,
        program: Program,
        item: NewCatalogItem,
    ) -> StoreResult<CatalogItem> {
        let row = sqlx::query_as::<_, CatalogItemRow>(&format!(
            "INSERT INTO catalog_items (id, program, name, description, poster_url, handout_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(program.as_str())
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.poster_url)
        .bind(&item.handout_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "create catalog item"))?;

        row.try_into()
    }

    async fn update_item(
        &self,
        program: Program,
        id: Uuid,
        patch: CatalogPatch,
    ) -> StoreResult<CatalogItem> {
        let row = sqlx::query_as::<_, CatalogItemRow>(&format!(
            "UPDATE catalog_items SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                poster_url = COALESCE($5, poster_url),
                handout_url = COALESCE($6, handout_url)
             WHERE program = $1 AND id = $2
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(program.as_str())
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.poster_url)
        .bind(&patch.handout_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "update catalog item"))?
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", program.item_noun(), id)))?;

        row.try_into()
    }

    async fn delete_item(&self, program: Program, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM catalog_items WHERE program = $1 AND id = $2")
            .bind(program.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "delete catalog item"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} {}", program.item_noun(), id)));
        }
        Ok(())
    }

    async fn registered_item_ids(
        &self,
        program: Program,
        user_id: &str,
    ) -> StoreResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT item_id FROM registrations WHERE program = $1 AND user_id = $2 ORDER BY created_at",
        )
        .bind(program.as_str())
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "list registrations"))
    }

    async fn register_within(
        &self,
        program: Program,
        user_id: &str,
        item_id: Uuid,
        limit: usize,
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error(e, "begin registration"))?;

        // Serializes registrations of one user within one program.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
            .bind(program.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error(e, "lock registrations"))?;

        let duplicate = format!("user {} already registered for {}", user_id, item_id);
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM registrations WHERE user_id = $1 AND item_id = $2)",
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, "check registration"))?;
        if exists {
            return Err(StoreError::Conflict(duplicate));
        }

        if limit > 0 {
            let held: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM registrations WHERE program = $1 AND user_id = $2",
            )
            .bind(program.as_str())
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_db_error(e, "count registrations"))?;
            if held >= limit as i64 {
                return Err(StoreError::LimitReached(format!(
                    "user {} holds {} registrations",
                    user_id, held
                )));
            }
        }

        // The item must belong to the program; the primary key rejects duplicates.
        let result = sqlx::query(
            "INSERT INTO registrations (user_id, item_id, program)
             SELECT $1, id, program FROM catalog_items WHERE id = $2 AND program = $3",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(program.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, &duplicate))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "{} {}",
                program.item_noun(),
                item_id
            )));
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error(e, "commit registration"))?;
        Ok(())
    }

    async fn unregister(&self, program: Program, user_id: &str, item_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM registrations WHERE program = $1 AND user_id = $2 AND item_id = $3",
        )
        .bind(program.as_str())
        .bind(user_id)
        .bind(item_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "delete registration"))?;
        if result.rows_affected() == 0 {
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
        sqlx::query_as::<_, RegistrationJoinRow>(
            "SELECT u.id AS user_id, u.email, NULLIF(u.display_name, '') AS display_name,
                    u.phone_number, c.id AS item_id, c.name AS item_name
             FROM registrations r
             JOIN users u ON u.id = r.user_id
             JOIN catalog_items c ON c.id = r.item_id
             WHERE r.program = $1 AND ($2::uuid IS NULL OR r.item_id = $2)
             ORDER BY r.created_at, u.email",
        )
        .bind(program.as_str())
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "load roster"))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "health check"))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
