//! Moderation endpoints. Every handler requires [`AdminUser`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use truekland_shared::events::{ChangeEvent, PostChange};
use truekland_shared::{NotificationType, PostId};
use truekland_store::{MarketplaceStats, NewNotification, Post};

use super::posts::{remove_post, BrowseQuery};
use super::AppState;
use crate::auth::AdminUser;
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    is_authorized: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    marketplace: MarketplaceStats,
    uploads: usize,
    live_subscribers: usize,
}

pub async fn list_all_posts(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let filter = query.into_filter(true);
    let posts = state.with_db(|db| db.list_posts(&filter))?;
    Ok(Json(posts))
}

pub async fn set_post_authorization(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(req): Json<AuthorizationRequest>,
) -> Result<Json<Post>, ServerError> {
    let post = state.with_db(|db| db.set_post_authorized(id, req.is_authorized))?;

    info!(
        post = %id,
        admin = %admin.id,
        authorized = req.is_authorized,
        "Post moderated"
    );

    let verdict = if req.is_authorized {
        "approved and is now visible"
    } else {
        "hidden by a moderator"
    };
    state
        .notify(NewNotification {
            user_id: post.owner_id,
            kind: NotificationType::PostModerated,
            title: "Post moderated".into(),
            message: format!("Your post \"{}\" was {verdict}", post.title),
            related_id: Some(id.0),
        })
        .await;
    state
        .events
        .broadcast(&ChangeEvent::PostChanged {
            post_id: id,
            change: PostChange::Moderated,
        })
        .await;

    Ok(Json(post))
}

pub async fn delete_any_post(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<StatusCode, ServerError> {
    let post = state.with_db(|db| db.get_post(id))?;
    remove_post(&state, &post).await?;

    info!(post = %id, admin = %admin.id, "Post removed by moderator");
    if post.owner_id != admin.id {
        state
            .notify(NewNotification {
                user_id: post.owner_id,
                kind: NotificationType::PostModerated,
                title: "Post removed".into(),
                message: format!("Your post \"{}\" was removed by a moderator", post.title),
                related_id: None,
            })
            .await;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ServerError> {
    let marketplace = state.with_db(|db| db.marketplace_stats())?;
    Ok(Json(StatsResponse {
        marketplace,
        uploads: state.uploads.count_images().await?,
        live_subscribers: state.events.subscriber_count().await,
    }))
}
