#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use tower::ServiceExt;

use cte_portal::app::{build_router, AppOptions, AppState};
use cte_portal::auth::{AdminGate, AdminTableGate};
use cte_portal::error::{AppError, AppResult};
use cte_portal::models::NewUser;
use cte_portal::oauth::IdentityProvider;
use cte_portal::session::{Identity, MemorySessionStore, SessionData, SessionStore};
use cte_portal::storage::MemoryBackend;
use cte_portal::store::{InMemoryStore, PortalStore};

pub const DOMAIN: &str = "@goa.bits-pilani.ac.in";
pub const ASSET_BASE: &str = "https://assets.example.edu";
pub const BOUNDARY: &str = "cte-portal-test-boundary";

/// Hands out preconfigured identities for known authorization codes.
#[derive(Default)]
pub struct FakeIdentityProvider {
    codes: HashMap<String, Identity>,
}

impl FakeIdentityProvider {
    pub fn with_code(mut self, code: &str, identity: Identity) -> Self {
        self.codes.insert(code.to_string(), identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://idp.test/authorize?state={}", state)
    }

    async fn exchange(&self, code: &str) -> AppResult<Identity> {
        self.codes
            .get(code)
            .cloned()
            .ok_or_else(|| AppError::Identity(format!("unknown code {}", code)))
    }
}

pub fn identity(user_id: &str, email: &str, name: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        email: Some(email.to_string()),
        display_name: name.to_string(),
    }
}

pub fn default_options() -> AppOptions {
    AppOptions {
        allowed_email_domain: DOMAIN.to_string(),
        max_registrations: 3,
        admin_password: None,
        upload_limit_bytes: 1024 * 1024,
        session_ttl: Duration::from_secs(3600),
        cookie_secure: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryStore,
    pub storage: Arc<MemoryBackend>,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(FakeIdentityProvider::default(), default_options(), None)
    }

    pub fn build(
        identity: FakeIdentityProvider,
        options: AppOptions,
        gate: Option<Arc<dyn AdminGate>>,
    ) -> Self {
        let store = InMemoryStore::new();
        let storage = Arc::new(MemoryBackend::new(ASSET_BASE));
        let sessions = Arc::new(MemorySessionStore::new());
        let gate: Arc<dyn AdminGate> = match gate {
            Some(gate) => gate,
            None => Arc::new(AdminTableGate::new(Arc::new(store.clone()))),
        };
        let state = AppState::new(
            Arc::new(store.clone()),
            storage.clone(),
            Arc::new(identity),
            gate,
            &options,
        );
        let router = build_router(state, sessions.clone(), &options);
        Self {
            router,
            store,
            storage,
            sessions,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Stores a logged-in session directly and returns its cookie.
    pub async fn session_for(&self, identity: Identity) -> String {
        self.store
            .upsert_user(NewUser {
                id: identity.user_id.clone(),
                email: identity.email.clone().unwrap_or_default(),
                display_name: identity.display_name.clone(),
            })
            .await
            .expect("upsert");
        let id = format!("sid-{}", identity.user_id);
        let data = SessionData {
            identity: Some(identity),
            ..Default::default()
        };
        self.sessions
            .save(&id, &data, Duration::from_secs(3600))
            .await
            .expect("save session");
        format!("cte_sid={}", id)
    }

    pub async fn admin_cookie(&self, user_id: &str) -> String {
        let email = format!("{}{}", user_id, DOMAIN);
        self.store.seed_admin(&email, Some("Admin")).await;
        self.session_for(identity(user_id, &email, "Admin")).await
    }
}

pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn post_form(path: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn post_multipart(path: &str, cookie: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                        name, value
                    )
                    .as_bytes(),
                );
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).expect("request")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}

/// `cte_sid=<id>` from the response's Set-Cookie, if one was issued.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("cte_sid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn read_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&read_bytes(response).await).expect("json")
}

pub async fn read_text(response: Response<Body>) -> String {
    String::from_utf8(read_bytes(response).await).expect("utf8")
}
