//! Admin dashboards, exports, catalog maintenance and admin membership.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AdminInfo;
use crate::error::{AppError, AppResult};
use crate::models::Program;
use crate::roster::{CsvDownload, PageQuery};
use crate::services::{AdminDashboard, CatalogForm, Upload};
use crate::session::Session;

const USERS_TAB_PATH: &str = "/admin/dashboard?tab=users";

#[derive(Debug, Serialize)]
pub struct AdminDashboardPage {
    pub admin: AdminInfo,
    pub is_admin: bool,
    #[serde(flatten)]
    pub dashboard: AdminDashboard,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    Extension(admin): Extension<AdminInfo>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<AdminDashboardPage>> {
    let dashboard = state.rosters.dashboard(program, &query).await?;
    Ok(Json(AdminDashboardPage {
        admin,
        is_admin: true,
        dashboard,
    }))
}

pub async fn techweekend_index() -> Redirect {
    Redirect::to(Program::TechWeekend.admin_dashboard_path())
}

pub async fn download_grouped(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
) -> AppResult<CsvDownload> {
    state.rosters.grouped_csv(program).await
}

pub async fn download_item(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    Path(item_id): Path<Uuid>,
) -> AppResult<CsvDownload> {
    state.rosters.item_csv(program, item_id).await
}

fn form_error(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidInput(format!("Invalid form data: {}", e))
}

async fn read_catalog_form(mut multipart: Multipart) -> AppResult<CatalogForm> {
    let mut form = CatalogForm::default();
    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "poster" | "handout" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(form_error)?;
                // An empty file input is submitted as a nameless, empty part.
                if filename.is_empty() || data.is_empty() {
                    continue;
                }
                let upload = Some(Upload {
                    filename,
                    content_type,
                    data,
                });
                if name == "poster" {
                    form.poster = upload;
                } else {
                    form.handout = upload;
                }
            }
            "name" => form.name = Some(field.text().await.map_err(form_error)?),
            "description" | "course_description" | "event_description" => {
                form.description = Some(field.text().await.map_err(form_error)?)
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn create_item(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let form = read_catalog_form(multipart).await?;
    state.catalog.create(program, form).await?;
    Ok(Redirect::to(program.admin_dashboard_path()))
}

pub async fn edit_item(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let form = read_catalog_form(multipart).await?;
    state.catalog.edit(program, id, form).await?;
    Ok(Redirect::to(program.admin_dashboard_path()))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let outcome = state.catalog.delete(program, id).await?;
    if outcome.is_complete() {
        return Ok(Redirect::to(program.admin_dashboard_path()).into_response());
    }
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "partial",
            "failed_assets": outcome.failed_assets,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
    pub user_id: Option<String>,
    pub item_id: Option<String>,
}

pub async fn delete_registration(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    Form(form): Form<RegistrationForm>,
) -> AppResult<Redirect> {
    let user_id = form.user_id.filter(|v| !v.trim().is_empty());
    let item_id = form.item_id.filter(|v| !v.trim().is_empty());
    let (Some(user_id), Some(item_id)) = (user_id, item_id) else {
        return Err(AppError::InvalidInput(
            "user_id and item_id are required".to_string(),
        ));
    };
    let item_id = Uuid::parse_str(item_id.trim())
        .map_err(|_| AppError::InvalidInput(format!("invalid item id {}", item_id)))?;

    state
        .registrations
        .unregister(program, user_id.trim(), item_id)
        .await?;
    Ok(Redirect::to(program.admin_dashboard_path()))
}

#[derive(Debug, Deserialize)]
pub struct EmailForm {
    #[serde(default)]
    pub email: String,
}

pub async fn promote(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminInfo>,
    Form(form): Form<EmailForm>,
) -> AppResult<Redirect> {
    state.admins.promote(&admin, &form.email).await?;
    Ok(Redirect::to(USERS_TAB_PATH))
}

pub async fn demote(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminInfo>,
    Form(form): Form<EmailForm>,
) -> AppResult<Redirect> {
    state.admins.demote(&admin, &form.email).await?;
    Ok(Redirect::to(USERS_TAB_PATH))
}

pub async fn verify_password_page() -> Json<serde_json::Value> {
    Json(json!({
        "page": "admin_password",
        "action": crate::middleware::VERIFY_PASSWORD_PATH,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub password: String,
}

pub async fn verify_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PasswordForm>,
) -> AppResult<Redirect> {
    if let Some(password) = &state.admin_password {
        if !password.verify(&form.password) {
            tracing::warn!("admin password rejected");
            return Err(AppError::Forbidden("Invalid admin password".to_string()));
        }
    }

    let intended = session
        .get()
        .intended_admin_path
        .filter(|path| path.starts_with("/admin"))
        .unwrap_or_else(|| Program::Courses.admin_dashboard_path().to_string());
    session
        .update(|data| {
            data.admin_verified = true;
            data.intended_admin_path = None;
        })
        .await?;
    Ok(Redirect::to(&intended))
}
