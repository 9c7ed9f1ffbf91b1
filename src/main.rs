use std::net::SocketAddr;
use std::sync::Arc;

use cte_portal::app::{build_router, AppOptions, AppState};
use cte_portal::auth::{AdminGate, AdminTableGate, AllowListGate};
use cte_portal::config::{AdminGateKind, Config, StorageKind};
use cte_portal::oauth::GoogleOAuth;
use cte_portal::session::{MemorySessionStore, PgSessionStore, SessionStore};
use cte_portal::storage::{GcsBackend, MemoryBackend, R2Backend, StorageBackend};
use cte_portal::store::{InMemoryStore, PgStore, PortalStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cte_portal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting cte-portal...");

    let (store, session_store): (Arc<dyn PortalStore>, Arc<dyn SessionStore>) =
        match &config.database_url {
            Some(database_url) => {
                tracing::info!("Connecting to database...");
                let pool = PgStore::connect(database_url).await?;
                let store = PgStore::new(pool.clone());
                store.migrate().await?;
                tracing::info!("Database connection established, migrations applied");

                let sessions = PgSessionStore::new(pool);
                let purged = sessions.purge_expired().await?;
                tracing::info!("Purged {} expired sessions", purged);

                let store: Arc<dyn PortalStore> = Arc::new(store);
                let sessions: Arc<dyn SessionStore> = Arc::new(sessions);
                (store, sessions)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                let store: Arc<dyn PortalStore> = Arc::new(InMemoryStore::new());
                let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
                (store, sessions)
            }
        };

    let storage: Arc<dyn StorageBackend> = match &config.storage {
        StorageKind::R2 {
            bucket,
            account_id,
            access_key,
            secret_key,
        } => {
            tracing::info!("R2 storage enabled: bucket={}", bucket);
            Arc::new(R2Backend::new(
                bucket.clone(),
                account_id.clone(),
                access_key.clone(),
                secret_key.clone(),
                config.public_asset_base_url.clone(),
            )?)
        }
        StorageKind::Gcs { bucket } => {
            tracing::info!("GCS storage enabled: bucket={}", bucket);
            Arc::new(GcsBackend::new(bucket.clone(), config.public_asset_base_url.clone()).await?)
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory object storage; uploads are lost on restart");
            Arc::new(MemoryBackend::new(
                config
                    .public_asset_base_url
                    .clone()
                    .unwrap_or_else(|| "memory://assets".to_string()),
            ))
        }
    };

    let gate: Arc<dyn AdminGate> = match config.admin_gate {
        AdminGateKind::Table => {
            tracing::info!("Admin gate: admin table");
            Arc::new(AdminTableGate::new(store.clone()))
        }
        AdminGateKind::AllowList => {
            tracing::info!(
                "Admin gate: allow-list ({} entries)",
                config.admin_emails.len()
            );
            Arc::new(AllowListGate::new(config.admin_emails.clone()))
        }
    };

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let identity = Arc::new(GoogleOAuth::new(
        http_client,
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_callback_url.clone(),
    ));

    let options = AppOptions::from_config(&config)?;
    if options.admin_password.is_some() {
        tracing::info!("Admin password step-up enabled");
    }
    let state = AppState::new(store, storage, identity, gate, &options);
    let app = build_router(state, session_store, &options);

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
