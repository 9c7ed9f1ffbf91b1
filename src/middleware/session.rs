//! Cookie-backed session loading.
//!
//! Every request gets a [`Session`] in its extensions. The cookie is only
//! issued once something has been written to the session, and cleared again
//! when the session is destroyed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request};
use tower::{Layer, Service};

use crate::error::AppError;
use crate::session::{generate_session_id, Session, SessionStore, SESSION_COOKIE};

#[derive(Clone)]
pub struct SessionLayer {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    secure: bool,
}

impl SessionLayer {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration, secure: bool) -> Self {
        Self { store, ttl, secure }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    layer: SessionLayer,
}

/// Value of the session cookie, if the request carries one.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn cookie_header(value: &str, max_age: u64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

impl SessionLayer {
    async fn open(&self, cookie: Option<&str>) -> Result<Session, AppError> {
        if let Some(id) = cookie {
            if let Some(data) = self.store.load(id).await? {
                return Ok(Session::new(
                    id.to_string(),
                    self.store.clone(),
                    self.ttl,
                    Some(data),
                ));
            }
            tracing::debug!("unknown or expired session cookie, starting a new session");
        }
        Ok(Session::new(
            generate_session_id()?,
            self.store.clone(),
            self.ttl,
            None,
        ))
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for SessionMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);

        let layer = self.layer.clone();

        Box::pin(async move {
            let cookie = session_cookie(req.headers());
            let session = match layer.open(cookie.as_deref()).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!("failed to load session: {}", e);
                    return Ok(e.into_response());
                }
            };
            req.extensions_mut().insert(session.clone());

            let mut response = inner.call(req).await?;

            let id = session.id();
            let set_cookie = if session.is_destroyed() {
                cookie.as_ref().and_then(|_| cookie_header("", 0, layer.secure))
            } else if session.is_persisted() && cookie.as_deref() != Some(id.as_str()) {
                cookie_header(&id, layer.ttl.as_secs(), layer.secure)
            } else {
                None
            };
            if let Some(value) = set_cookie {
                response.headers_mut().append(SET_COOKIE, value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; cte_sid=abc123 ; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("cte_sid="));
        assert_eq!(session_cookie(&headers), None);

        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let value = cookie_header("abc", 60, true).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "cte_sid=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=60; Secure"
        );
        let value = cookie_header("abc", 60, false).unwrap();
        assert!(!value.to_str().unwrap().contains("Secure"));
    }
}
