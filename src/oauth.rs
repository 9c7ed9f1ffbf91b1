//! Authorization-code login against Google.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::google_auth::GoogleTokenVerifier;
use crate::session::Identity;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str = "openid email profile";

/// Where users are sent to log in, and how the returned code becomes an identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange(&self, code: &str) -> AppResult<Identity>;
}

pub fn build_authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(SCOPES),
        urlencoding::encode(state),
    )
}

/// Exchange an authorization code for the ID token.
pub async fn exchange_code(
    http_client: &Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> AppResult<String> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];

    let response = http_client
        .post(TOKEN_URL)
        .form(&params)
        .send()
        .await
        .map_err(|e| AppError::Identity(format!("token request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Identity(format!(
            "token exchange failed: status={}, body={}",
            status, body
        )));
    }

    #[derive(Deserialize)]
    struct TokenResponse {
        id_token: String,
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AppError::Identity(format!("failed to parse token response: {}", e)))?;

    Ok(token.id_token)
}

pub struct GoogleOAuth {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    verifier: GoogleTokenVerifier,
}

impl GoogleOAuth {
    pub fn new(
        client: Client,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        let verifier = GoogleTokenVerifier::new(client.clone(), client_id.clone());
        Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
            verifier,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str) -> String {
        build_authorize_url(&self.client_id, &self.redirect_uri, state)
    }

    async fn exchange(&self, code: &str) -> AppResult<Identity> {
        let id_token = exchange_code(
            &self.client,
            &self.client_id,
            &self.client_secret,
            code,
            &self.redirect_uri,
        )
        .await?;
        let claims = self.verifier.verify(&id_token).await?;

        let display_name = claims.name.unwrap_or_else(|| claims.email.clone());
        Ok(Identity {
            user_id: claims.sub,
            email: Some(claims.email),
            display_name,
        })
    }
}
