//! Google login, the domain gate at login, and logout.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::google_auth::is_allowed_email;
use crate::models::{NewUser, Program};
use crate::session::{generate_session_id, Session, SessionData};

pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

pub async fn login(State(state): State<AppState>, session: Session) -> AppResult<Redirect> {
    let oauth_state = generate_session_id()?;
    let url = state.identity.authorize_url(&oauth_state);
    session
        .update(|data| data.oauth_state = Some(oauth_state))
        .await?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    let expected = session.get().oauth_state;
    if expected.is_none() || expected != query.state {
        return Err(AppError::InvalidInput("Invalid OAuth state".to_string()));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing authorization code".to_string()))?;

    let identity = state.identity.exchange(&code).await?;

    let email = match identity.email.as_deref() {
        Some(email) if is_allowed_email(email, &state.allowed_email_domain) => email.to_string(),
        other => {
            tracing::warn!("login rejected for {:?}", other);
            session.set(SessionData::default()).await?;
            return Ok(Redirect::to(UNAUTHORIZED_PATH).into_response());
        }
    };

    let upserted = state
        .store
        .upsert_user(NewUser {
            id: identity.user_id.clone(),
            email: email.clone(),
            display_name: identity.display_name.clone(),
        })
        .await;
    if let Err(e) = upserted {
        tracing::error!("user upsert failed for {}: {:#}", email, e);
        session.set(SessionData::default()).await?;
        return Ok(Redirect::to(UNAUTHORIZED_PATH).into_response());
    }

    let mut data = session.get();
    data.log_in(identity);
    session.regenerate(data).await?;
    tracing::info!("{} logged in", email);
    Ok(Redirect::to(Program::Courses.user_dashboard_path()).into_response())
}

pub async fn unauthorized(State(state): State<AppState>) -> String {
    format!(
        "Access restricted to {} users only.",
        state.allowed_email_domain
    )
}

pub async fn logout(session: Session) -> AppResult<Redirect> {
    if let Some(identity) = session.identity() {
        tracing::info!("{} logged out", identity.user_id);
    }
    session.destroy().await?;
    Ok(Redirect::to("/"))
}
