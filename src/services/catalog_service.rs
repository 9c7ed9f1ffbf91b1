//! Catalog maintenance: create, edit and delete courses/events together with
//! their poster and handout assets in object storage.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CatalogItem, CatalogPatch, NewCatalogItem, Program};
use crate::storage::{sanitize_filename, StorageBackend};
use crate::store::PortalStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Poster,
    Handout,
}

impl AssetKind {
    fn dir(&self) -> &'static str {
        match self {
            Self::Poster => "posters",
            Self::Handout => "handouts",
        }
    }
}

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Fields of the create/edit form. Blank text fields count as absent.
#[derive(Debug, Clone, Default)]
pub struct CatalogForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub poster: Option<Upload>,
    pub handout: Option<Upload>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `<program>/<posters|handouts>/<unix-millis>_<filename>`
pub fn asset_key(program: Program, kind: AssetKind, filename: &str, millis: i64) -> String {
    format!(
        "{}/{}/{}_{}",
        program.as_str(),
        kind.dir(),
        millis,
        sanitize_filename(filename)
    )
}

/// Result of a delete. Asset removal failures do not stop the row delete.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub failed_assets: Vec<String>,
}

impl DeleteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_assets.is_empty()
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn PortalStore>,
    storage: Arc<dyn StorageBackend>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn PortalStore>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { store, storage }
    }

    async fn upload(
        &self,
        program: Program,
        kind: AssetKind,
        upload: Option<Upload>,
    ) -> AppResult<Option<String>> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        let key = asset_key(
            program,
            kind,
            &upload.filename,
            Utc::now().timestamp_millis(),
        );
        let url = self
            .storage
            .upload(&key, &upload.data, &upload.content_type)
            .await?;
        tracing::info!("uploaded {} to {}", upload.filename, key);
        Ok(Some(url))
    }

    pub async fn create(&self, program: Program, form: CatalogForm) -> AppResult<CatalogItem> {
        let name = non_blank(form.name);
        let description = non_blank(form.description);
        let (Some(name), Some(description)) = (name, description) else {
            return Err(AppError::InvalidInput(
                "Name and description are required".to_string(),
            ));
        };

        let poster_url = self.upload(program, AssetKind::Poster, form.poster).await?;
        let handout_url = self
            .upload(program, AssetKind::Handout, form.handout)
            .await?;

        let item = self
            .store
            .create_item(
                program,
                NewCatalogItem {
                    name,
                    description,
                    poster_url,
                    handout_url,
                },
            )
            .await?;
        tracing::info!("created {} {} ({})", program.item_noun(), item.id, item.name);
        Ok(item)
    }

    pub async fn edit(
        &self,
        program: Program,
        id: Uuid,
        form: CatalogForm,
    ) -> AppResult<CatalogItem> {
        if self.store.get_item(program, id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                program.item_noun(),
                id
            )));
        }

        let patch = CatalogPatch {
            name: non_blank(form.name),
            description: non_blank(form.description),
            poster_url: self.upload(program, AssetKind::Poster, form.poster).await?,
            handout_url: self
                .upload(program, AssetKind::Handout, form.handout)
                .await?,
        };
        let item = self.store.update_item(program, id, patch).await?;
        tracing::info!("updated {} {}", program.item_noun(), id);
        Ok(item)
    }

    pub async fn delete(&self, program: Program, id: Uuid) -> AppResult<DeleteOutcome> {
        let item = self.store.get_item(program, id).await?.ok_or_else(|| {
            AppError::NotFound(format!("{} {} not found", program.item_noun(), id))
        })?;

        let mut failed_assets = Vec::new();
        for url in item.asset_urls() {
            let Some(key) = self.storage.key_for_url(url) else {
                tracing::debug!("skipping asset outside {}: {}", self.storage.bucket(), url);
                continue;
            };
            if let Err(e) = self.storage.delete(&key).await {
                tracing::warn!("failed to delete asset {}: {}", key, e);
                failed_assets.push(url.to_string());
            }
        }

        self.store.delete_item(program, id).await?;
        if failed_assets.is_empty() {
            tracing::info!("deleted {} {}", program.item_noun(), id);
        } else {
            tracing::warn!(
                "deleted {} {} with {} orphaned assets",
                program.item_noun(),
                id,
                failed_assets.len()
            );
        }
        Ok(DeleteOutcome { failed_assets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::store::InMemoryStore;

    const BASE: &str = "https://assets.example.edu";

    fn service() -> (CatalogService, InMemoryStore, Arc<MemoryBackend>) {
        let store = InMemoryStore::new();
        let storage = Arc::new(MemoryBackend::new(BASE));
        let service = CatalogService::new(Arc::new(store.clone()), storage.clone());
        (service, store, storage)
    }

    fn form(name: &str, description: &str) -> CatalogForm {
        CatalogForm {
            name: Some(name.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    fn poster() -> Upload {
        Upload {
            filename: "My Poster.png".into(),
            content_type: "image/png".into(),
            data: Bytes::from_static(b"png"),
        }
    }

    #[test]
    fn test_asset_key_layout() {
        assert_eq!(
            asset_key(Program::TechWeekend, AssetKind::Handout, "a b.pdf", 1700000000000),
            "techweekend/handouts/1700000000000_a_b.pdf"
        );
    }

    #[tokio::test]
    async fn test_create_requires_name_and_description() {
        let (service, store, _) = service();
        store.set_unavailable(true);

        let err = service
            .create(Program::Courses, form("  ", "desc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = service
            .create(Program::Courses, CatalogForm::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_stores_public_url() {
        let (service, store, storage) = service();
        let mut form = form("Rust 101", "Intro");
        form.poster = Some(poster());

        let item = service.create(Program::Courses, form).await.unwrap();

        let url = item.poster_url.clone().unwrap();
        assert!(url.starts_with("https://assets.example.edu/courses/posters/"));
        assert!(url.ends_with("_My_Poster.png"));
        assert!(item.handout_url.is_none());
        let key = storage.key_for_url(&url).unwrap();
        assert_eq!(storage.get(&key).await.unwrap().content_type, "image/png");
        assert_eq!(
            store.get_item(Program::Courses, item.id).await.unwrap(),
            Some(item)
        );
    }

    #[tokio::test]
    async fn test_edit_keeps_omitted_fields() {
        let (service, _, _) = service();
        let created = service
            .create(Program::Courses, form("Rust 101", "Intro"))
            .await
            .unwrap();

        let edited = service
            .edit(
                Program::Courses,
                created.id,
                CatalogForm {
                    name: Some("".into()),
                    description: Some("Updated".into()),
                    poster: Some(poster()),
                    handout: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.name, "Rust 101");
        assert_eq!(edited.description, "Updated");
        assert!(edited.poster_url.is_some());
    }

    #[tokio::test]
    async fn test_edit_missing_item_uploads_nothing() {
        let (service, _, storage) = service();
        let mut form = form("x", "y");
        form.poster = Some(poster());

        let err = service
            .edit(Program::Courses, Uuid::new_v4(), form)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_assets_and_row() {
        let (service, store, storage) = service();
        let mut form = form("Rust 101", "Intro");
        form.poster = Some(poster());
        let item = service.create(Program::Courses, form).await.unwrap();

        let outcome = service.delete(Program::Courses, item.id).await.unwrap();

        assert!(outcome.is_complete());
        assert!(storage.keys().await.is_empty());
        assert!(store
            .get_item(Program::Courses, item.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_partial_failure() {
        let (service, store, storage) = service();
        let mut form = form("Rust 101", "Intro");
        form.poster = Some(poster());
        let item = service.create(Program::Courses, form).await.unwrap();
        storage.set_fail_deletes(true);

        let outcome = service.delete(Program::Courses, item.id).await.unwrap();

        assert_eq!(outcome.failed_assets, vec![item.poster_url.clone().unwrap()]);
        assert!(store
            .get_item(Program::Courses, item.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_skips_foreign_urls() {
        let (service, store, _) = service();
        let item = store
            .create_item(
                Program::TechWeekend,
                NewCatalogItem {
                    name: "Hackathon".into(),
                    description: "24h".into(),
                    poster_url: Some("https://elsewhere.com/p.png".into()),
                    handout_url: None,
                },
            )
            .await
            .unwrap();

        let outcome = service.delete(Program::TechWeekend, item.id).await.unwrap();
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (service, _, _) = service();
        let err = service
            .delete(Program::Courses, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
