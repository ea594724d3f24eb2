//! HTTP API: shared state, router assembly and the handlers that do not
//! belong to a resource.

mod accounts;
mod admin;
mod chats;
mod events;
mod exchanges;
mod notifications;
mod posts;
mod uploads;


use std::sync::{Arc, Mutex};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::Method,
    middleware,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use truekland_shared::events::ChangeEvent;
use truekland_shared::Category;
use truekland_store::{Database, NewNotification};

use crate::auth::SessionKeys;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, Limiters};
use crate::realtime::EventHub;
use crate::upload_store::UploadStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub uploads: Arc<UploadStore>,
    pub sessions: Arc<SessionKeys>,
    pub events: EventHub,
    pub limiters: Limiters,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Run a synchronous store operation under the database lock.
    ///
    /// The guard lives only inside this call and is never held across an
    /// `.await`.
    pub fn with_db<T, E>(&self, f: impl FnOnce(&Database) -> Result<T, E>) -> Result<T, ServerError>
    where
        ServerError: From<E>,
    {
        let db = self
            .db
            .lock()
            .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
        Ok(f(&db)?)
    }

    /// Store a notification and push it to the recipient. The mutation that
    /// triggered it has already committed, so failures are only logged.
    pub async fn notify(&self, new: NewNotification) {
        let user = new.user_id;
        let kind = new.kind;
        match self.with_db(|db| db.create_notification(new)) {
            Ok(notification) => {
                let event = ChangeEvent::NotificationCreated {
                    notification: to_json(&notification),
                };
                self.events.publish_to(user, &event).await;
            }
            Err(e) => warn!(user = %user, kind = %kind, error = %e, "Failed to store notification"),
        }
    }
}

/// Serialize an API document for an event payload.
pub(crate) fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    // Multipart framing on top of the largest accepted image.
    let body_limit = state.uploads.max_size() + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // accounts
        .route("/auth/register", post(accounts::register))
        .route("/auth/login", post(accounts::login))
        .route("/auth/me", get(accounts::me))
        .route("/users/me", patch(accounts::update_me))
        .route("/users/:id", get(accounts::public_profile))
        .route("/users/:id/posts", get(accounts::user_posts))
        // posts
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/mine", get(posts::my_posts))
        .route(
            "/posts/:id",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        // uploads
        .route("/uploads", post(uploads::upload_image))
        .route("/uploads/:file", get(uploads::serve_image))
        // chats
        .route("/chats", get(chats::list_chats).post(chats::open_chat))
        .route("/chats/:id", get(chats::get_chat).delete(chats::delete_chat))
        .route(
            "/chats/:id/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        // exchanges
        .route(
            "/exchanges",
            get(exchanges::list_exchanges).post(exchanges::propose_exchange),
        )
        .route("/exchanges/:id", get(exchanges::get_exchange))
        .route("/exchanges/:id/:action", post(exchanges::transition_exchange))
        // notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // realtime
        .route("/events", get(events::event_stream))
        // moderation
        .route("/admin/posts", get(admin::list_all_posts))
        .route(
            "/admin/posts/:id/authorization",
            patch(admin::set_post_authorization),
        )
        .route("/admin/posts/:id", delete(admin::delete_any_post))
        .route("/admin/stats", get(admin::stats))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.limiters.requests.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
    posts_require_approval: bool,
    max_upload_size: usize,
    categories: Vec<&'static str>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
        posts_require_approval: state.config.posts_require_approval,
        max_upload_size: state.config.max_upload_size,
        categories: Category::ALL.iter().map(|c| c.as_str()).collect(),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
