//! Google ID token verification against Google's published signing keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

const ALLOWED_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Claims of a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleClaims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
    kty: String,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

struct JwksCache {
    keys: HashMap<String, JwkKey>,
    fetched_at: Instant,
}

fn identity_error(msg: impl Into<String>) -> AppError {
    AppError::Identity(msg.into())
}

/// Verifies RS256 ID tokens issued to `client_id`, caching the JWKS for an hour.
#[derive(Clone)]
pub struct GoogleTokenVerifier {
    client: Client,
    client_id: String,
    cache: Arc<RwLock<Option<JwksCache>>>,
}

impl GoogleTokenVerifier {
    pub fn new(client: Client, client_id: String) -> Self {
        Self {
            client,
            client_id,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn verify(&self, id_token: &str) -> AppResult<GoogleClaims> {
        let header = decode_header(id_token)
            .map_err(|e| identity_error(format!("invalid token header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| identity_error("token missing kid header"))?;

        let decoding_key = self.get_decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(ALLOWED_ISSUERS);

        let claims = decode::<GoogleIdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| identity_error(format!("token validation failed: {}", e)))?
            .claims;

        let email = claims
            .email
            .ok_or_else(|| identity_error("token missing email claim"))?;
        if claims.email_verified != Some(true) {
            return Err(identity_error("email not verified"));
        }

        Ok(GoogleClaims {
            sub: claims.sub,
            email,
            name: claims.name,
        })
    }

    async fn get_decoding_key(&self, kid: &str) -> AppResult<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(key) = cached.keys.get(kid) {
                        return jwk_to_decoding_key(key);
                    }
                }
            }
        }

        let jwks: JwksResponse = self
            .client
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .map_err(|e| identity_error(format!("failed to fetch JWKS: {}", e)))?
            .json()
            .await
            .map_err(|e| identity_error(format!("failed to parse JWKS: {}", e)))?;

        let keys: HashMap<String, JwkKey> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        let decoding_key = keys
            .get(kid)
            .ok_or_else(|| identity_error(format!("key '{}' not found in JWKS", kid)))
            .and_then(jwk_to_decoding_key)?;

        *self.cache.write().await = Some(JwksCache {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(decoding_key)
    }
}

fn jwk_to_decoding_key(key: &JwkKey) -> AppResult<DecodingKey> {
    if key.kty != "RSA" {
        return Err(identity_error(format!("unsupported key type: {}", key.kty)));
    }
    DecodingKey::from_rsa_components(&key.n, &key.e)
        .map_err(|e| identity_error(format!("failed to create decoding key: {}", e)))
}

/// Case-insensitive suffix match, e.g. `@goa.bits-pilani.ac.in`.
pub fn is_allowed_email(email: &str, allowed_domain: &str) -> bool {
    let domain = allowed_domain.trim().to_lowercase();
    !domain.is_empty() && email.trim().to_lowercase().ends_with(&domain)
}
