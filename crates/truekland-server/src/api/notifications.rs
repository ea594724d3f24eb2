use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use truekland_shared::NotificationId;
use truekland_store::Notification;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    unread: bool,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct CountResponse {
    count: i64,
}

#[derive(Serialize)]
pub struct MarkAllResponse {
    updated: usize,
}

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications =
        state.with_db(|db| db.list_notifications(auth.id, query.unread, limit))?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, ServerError> {
    let count = state.with_db(|db| db.count_unread_notifications(auth.id))?;
    Ok(Json(CountResponse { count }))
}

pub async fn mark_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ServerError> {
    if state.with_db(|db| db.mark_notification_read(id, auth.id))? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!("notification {id}")))
    }
}

pub async fn mark_all_read(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MarkAllResponse>, ServerError> {
    let updated = state.with_db(|db| db.mark_all_notifications_read(auth.id))?;
    Ok(Json(MarkAllResponse { updated }))
}
