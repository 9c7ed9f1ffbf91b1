//! Router wiring and the state shared by handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Extension, Router};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::{AdminGate, AdminPassword};
use crate::config::Config;
use crate::error::AppResult;
use crate::middleware::{require_admin, SessionLayer, VERIFY_PASSWORD_PATH};
use crate::models::Program;
use crate::oauth::IdentityProvider;
use crate::services::{AdminService, CatalogService, RegistrationService, RosterService};
use crate::session::SessionStore;
use crate::storage::StorageBackend;
use crate::store::PortalStore;

/// Settings that shape request handling rather than backend wiring.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub allowed_email_domain: String,
    pub max_registrations: usize,
    pub admin_password: Option<AdminPassword>,
    pub upload_limit_bytes: usize,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
}

impl AppOptions {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let admin_password = config
            .admin_password_hash
            .as_deref()
            .map(AdminPassword::new)
            .transpose()?;
        Ok(Self {
            allowed_email_domain: config.allowed_email_domain.clone(),
            max_registrations: config.max_registrations,
            admin_password,
            upload_limit_bytes: config.upload_limit_bytes,
            session_ttl: config.session_ttl,
            cookie_secure: config.cookie_secure,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PortalStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub gate: Arc<dyn AdminGate>,
    pub admin_password: Option<AdminPassword>,
    pub allowed_email_domain: String,
    pub catalog: CatalogService,
    pub registrations: RegistrationService,
    pub rosters: RosterService,
    pub admins: AdminService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PortalStore>,
        storage: Arc<dyn StorageBackend>,
        identity: Arc<dyn IdentityProvider>,
        gate: Arc<dyn AdminGate>,
        options: &AppOptions,
    ) -> Self {
        Self {
            catalog: CatalogService::new(store.clone(), storage),
            registrations: RegistrationService::new(store.clone(), options.max_registrations),
            rosters: RosterService::new(store.clone()),
            admins: AdminService::new(store.clone()),
            store,
            identity,
            gate,
            admin_password: options.admin_password.clone(),
            allowed_email_domain: options.allowed_email_domain.clone(),
        }
    }
}

fn user_routes(program: Program) -> Router<AppState> {
    let base = program.user_dashboard_path();
    Router::new()
        .route(base, get(api::dashboard::show))
        .route(
            &format!("{}/register/:item_id", base),
            post(api::dashboard::register),
        )
        .layer(Extension(program))
}

fn admin_program_routes(program: Program) -> Router<AppState> {
    let (base, collection) = match program {
        Program::Courses => ("/admin", "courses"),
        Program::TechWeekend => ("/admin/techweekend", "events"),
    };
    Router::new()
        .route(program.admin_dashboard_path(), get(api::admin::dashboard))
        .route(
            &format!("{}/registrations/download", base),
            get(api::admin::download_grouped),
        )
        .route(
            &format!("{}/registrations/:item_id/download", base),
            get(api::admin::download_item),
        )
        .route(
            &format!("{}/registrations/delete", base),
            post(api::admin::delete_registration),
        )
        .route(
            &format!("{}/{}/add", base, collection),
            post(api::admin::create_item),
        )
        .route(
            &format!("{}/{}/:id/edit", base, collection),
            post(api::admin::edit_item),
        )
        .route(
            &format!("{}/{}/:id/delete", base, collection),
            post(api::admin::delete_item),
        )
        .layer(Extension(program))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(admin_program_routes(Program::Courses))
        .merge(admin_program_routes(Program::TechWeekend))
        .route("/admin/techweekend", get(api::admin::techweekend_index))
        .route("/admin/promote", post(api::admin::promote))
        .route("/admin/demote", post(api::admin::demote))
        .route(
            VERIFY_PASSWORD_PATH,
            get(api::admin::verify_password_page).post(api::admin::verify_password),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ))
}

pub fn build_router(
    state: AppState,
    session_store: Arc<dyn SessionStore>,
    options: &AppOptions,
) -> Router {
    Router::new()
        .route("/", get(api::system::index))
        .route("/health", get(api::system::health))
        .route("/auth/google", get(api::auth::login))
        .route("/auth/google/callback", get(api::auth::callback))
        .route(api::auth::UNAUTHORIZED_PATH, get(api::auth::unauthorized))
        .route("/logout", get(api::auth::logout))
        .route("/dashboard/phone", post(api::dashboard::update_phone))
        .merge(user_routes(Program::Courses))
        .merge(user_routes(Program::TechWeekend))
        .merge(admin_routes(&state))
        .layer(DefaultBodyLimit::max(options.upload_limit_bytes))
        .layer(SessionLayer::new(
            session_store,
            options.session_ttl,
            options.cookie_secure,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
