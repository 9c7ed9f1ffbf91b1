//! Admin-side roster views and exports.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CatalogItem, Program, UserWithRole};
use crate::roster::{
    aggregate, grouped_columns, member_columns, sort_members, to_csv, CsvDownload, PageQuery,
    Pagination, RosterEntry,
};
use crate::store::PortalStore;

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserWithRole>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub program: Program,
    pub registrations: Vec<RosterEntry>,
    pub pagination: Pagination,
    pub items: Vec<CatalogItem>,
    /// Courses dashboard only.
    pub users: Option<UserPage>,
    pub active_tab: Option<String>,
}

#[derive(Clone)]
pub struct RosterService {
    store: Arc<dyn PortalStore>,
}

impl RosterService {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self { store }
    }

    pub async fn dashboard(&self, program: Program, query: &PageQuery) -> AppResult<AdminDashboard> {
        let rows = self.store.roster_rows(program, None).await?;
        let entries = aggregate(&rows);
        let pagination = query.paginate(entries.len() as u64);
        let registrations = pagination.window(&entries).to_vec();

        let items = self.store.list_items(program).await?;

        let users = match program {
            Program::Courses => Some(self.user_page(query).await?),
            Program::TechWeekend => None,
        };

        Ok(AdminDashboard {
            program,
            registrations,
            pagination,
            items,
            users,
            active_tab: query.tab.clone().filter(|t| !t.is_empty()),
        })
    }

    async fn user_page(&self, query: &PageQuery) -> AppResult<UserPage> {
        let limit = query.limit();
        let offset = (query.page() - 1).saturating_mul(limit);
        let page = self.store.list_users(offset, limit).await?;
        let admin_emails = self.store.list_admin_emails().await?;
        Ok(UserPage {
            users: page
                .items
                .into_iter()
                .map(|user| UserWithRole::annotate(user, &admin_emails))
                .collect(),
            pagination: query.paginate(page.total),
        })
    }

    /// One row per registered user.
    pub async fn grouped_csv(&self, program: Program) -> AppResult<CsvDownload> {
        let rows = self.store.roster_rows(program, None).await?;
        let entries = aggregate(&rows);
        let body = to_csv(&entries, &grouped_columns(program))?;
        tracing::info!("exported {} {} registrants", entries.len(), program);
        Ok(CsvDownload {
            filename: program.grouped_csv_filename().to_string(),
            body,
        })
    }

    /// Everyone registered for one item.
    pub async fn item_csv(&self, program: Program, item_id: Uuid) -> AppResult<CsvDownload> {
        let mut rows = self.store.roster_rows(program, Some(item_id)).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "No registrations found for this {}",
                program.item_noun()
            )));
        }
        sort_members(&mut rows);
        let body = to_csv(&rows, &member_columns())?;
        Ok(CsvDownload {
            filename: program.item_csv_filename(item_id),
            body,
        })
    }
}
