//! User dashboards for each program.

use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::{Extension, Form, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::CurrentUser;
use crate::app::AppState;
use crate::auth::is_admin;
use crate::error::{AppError, AppResult};
use crate::models::Program;
use crate::services::UserDashboard;

pub async fn show(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    user: CurrentUser,
) -> AppResult<Json<UserDashboard>> {
    let admin = is_admin(state.gate.as_ref(), &user.session).await?;
    let dashboard = state
        .registrations
        .dashboard(program, &user.identity.user_id, admin)
        .await?;
    Ok(Json(dashboard))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(program): Extension<Program>,
    user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Redirect> {
    state
        .registrations
        .register(program, &user.identity.user_id, item_id)
        .await?;
    Ok(Redirect::to(program.user_dashboard_path()))
}

#[derive(Debug, Deserialize)]
pub struct PhoneForm {
    pub phone: Option<String>,
}

pub async fn update_phone(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<PhoneForm>,
) -> AppResult<Redirect> {
    let phone = form
        .phone
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Phone number is required".to_string()))?;
    state
        .registrations
        .set_phone(&user.identity.user_id, &phone)
        .await?;
    Ok(Redirect::to(Program::Courses.user_dashboard_path()))
}
