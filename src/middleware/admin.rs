use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::app::AppState;
use crate::error::AppResult;
use crate::session::Session;

pub const VERIFY_PASSWORD_PATH: &str = "/admin/verify-password";

/// Admin-only routes. Runs the configured gate, then the password step-up
/// when one is configured, and hands the admin to handlers as an extension.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let admin = state.gate.authorize(&session).await?;

    if state.admin_password.is_some()
        && !session.get().admin_verified
        && req.uri().path() != VERIFY_PASSWORD_PATH
    {
        let intended = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        session
            .update(|data| data.intended_admin_path = Some(intended))
            .await?;
        return Ok(Redirect::to(VERIFY_PASSWORD_PATH).into_response());
    }

    req.extensions_mut().insert(admin);
    Ok(next.run(req).await)
}
