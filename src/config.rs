use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ALLOWED_EMAIL_DOMAIN: &str = "@goa.bits-pilani.ac.in";
pub const DEFAULT_MAX_REGISTRATIONS: usize = 3;
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which admin check guards the `/admin` routes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminGateKind {
    /// Static `ADMIN_EMAILS` list.
    AllowList,
    /// Persisted `admins` table, memoized in the session.
    Table,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    R2 {
        bucket: String,
        account_id: String,
        access_key: String,
        secret_key: String,
    },
    Gcs {
        bucket: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_callback_url: String,
    pub allowed_email_domain: String,
    pub admin_gate: AdminGateKind,
    pub admin_emails: Vec<String>,
    pub admin_password_hash: Option<String>,
    pub max_registrations: usize,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub upload_limit_bytes: usize,
    pub storage: StorageKind,
    pub public_asset_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let admin_gate = match var("ADMIN_GATE").as_deref() {
            None | Some("table") => AdminGateKind::Table,
            Some("allowlist") => AdminGateKind::AllowList,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "ADMIN_GATE",
                    value: other.to_string(),
                })
            }
        };

        let storage = match var("STORAGE_BACKEND").as_deref() {
            None | Some("memory") => StorageKind::Memory,
            Some("r2") => StorageKind::R2 {
                bucket: required("R2_BUCKET")?,
                account_id: required("R2_ACCOUNT_ID")?,
                access_key: required("R2_ACCESS_KEY_ID")?,
                secret_key: required("R2_SECRET_ACCESS_KEY")?,
            },
            Some("gcs") => StorageKind::Gcs {
                bucket: required("GCS_BUCKET")?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            database_url: var("DATABASE_URL"),
            server_host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", var("SERVER_PORT"), 3000)?,
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_callback_url: var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|| "http://localhost:3000/auth/google/callback".to_string()),
            allowed_email_domain: var("ALLOWED_EMAIL_DOMAIN")
                .unwrap_or_else(|| DEFAULT_ALLOWED_EMAIL_DOMAIN.to_string()),
            admin_gate,
            admin_emails: var("ADMIN_EMAILS")
                .map(|list| parse_email_list(&list))
                .unwrap_or_default(),
            admin_password_hash: var("ADMIN_PASSWORD_HASH"),
            max_registrations: parse_or(
                "MAX_REGISTRATIONS",
                var("MAX_REGISTRATIONS"),
                DEFAULT_MAX_REGISTRATIONS,
            )?,
            session_ttl: Duration::from_secs(parse_or(
                "SESSION_TTL_SECS",
                var("SESSION_TTL_SECS"),
                86_400,
            )?),
            cookie_secure: parse_or("COOKIE_SECURE", var("COOKIE_SECURE"), false)?,
            upload_limit_bytes: parse_or(
                "UPLOAD_LIMIT_BYTES",
                var("UPLOAD_LIMIT_BYTES"),
                DEFAULT_UPLOAD_LIMIT_BYTES,
            )?,
            storage,
            public_asset_base_url: var("PUBLIC_ASSET_BASE_URL"),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}
