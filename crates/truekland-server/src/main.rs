//! # truekland-server
//!
//! HTTP backend for the TrueKland barter marketplace.
//!
//! This binary provides:
//! - **REST API** (axum) for accounts, posts, chats, exchanges, notifications
//!   and moderation
//! - **Image uploads** sniffed and stored on local disk
//! - **Realtime** change events pushed to each user over server-sent events
//! - **Per-IP rate limiting** plus per-user limits on logins, messages and
//!   new posts

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod realtime;
mod upload_store;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use truekland_store::Database;

use crate::api::AppState;
use crate::auth::SessionKeys;
use crate::config::ServerConfig;
use crate::rate_limit::Limiters;
use crate::realtime::EventHub;
use crate::upload_store::UploadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,truekland_server=debug")),
        )
        .init();

    info!("Starting TrueKland server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        posts_require_approval = config.posts_require_approval,
        admins = config.admin_emails.len(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let database = Database::open_at(&config.database_path)?;

    let uploads = Arc::new(
        UploadStore::new(config.upload_storage_path.clone(), config.max_upload_size).await?,
    );

    let sessions = Arc::new(SessionKeys::from_config(&config));
    let limiters = Limiters::new(config.rate_limit_per_sec, config.rate_limit_burst);
    let events = EventHub::new();

    let app_state = AppState {
        db: Arc::new(Mutex::new(database)),
        uploads,
        sessions,
        events: events.clone(),
        limiters: limiters.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiters.purge_stale(600.0).await;
        }
    });

    // Forget realtime subscribers whose stream has closed
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            events.purge_closed().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
