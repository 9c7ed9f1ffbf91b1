//! HTTP handlers. Pages are JSON documents; form posts answer with redirects.

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod system;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::session::{Identity, Session};

pub const LOGIN_PATH: &str = "/auth/google";

/// The logged-in user. Anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: Identity,
    pub session: Session,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match session.identity() {
            Some(identity) => Ok(Self { identity, session }),
            None => Err(Redirect::to(LOGIN_PATH).into_response()),
        }
    }
}
