use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use truekland_shared::events::{ChangeEvent, PostChange};
use truekland_shared::validation::{PostInput, PostUpdateInput};
use truekland_shared::{Category, NotificationType, PostId, UserId};
use truekland_store::{Exchange, NewNotification, Post, PostFilter};

use super::{to_json, AppState};
use crate::auth::AuthUser;
use crate::error::ServerError;

/// Query string of the browse and moderation listings.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub category: Option<Category>,
    pub q: Option<String>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl BrowseQuery {
    pub fn into_filter(self, include_hidden: bool) -> PostFilter {
        PostFilter {
            category: self.category,
            query: self.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
            owner: None,
            include_hidden,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let filter = query.into_filter(false);
    let posts = state.with_db(|db| db.list_posts(&filter))?;
    Ok(Json(posts))
}

pub async fn my_posts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let filter = PostFilter {
        owner: Some(auth.id),
        include_hidden: true,
        ..PostFilter::default()
    };
    let posts = state.with_db(|db| db.list_posts(&filter))?;
    Ok(Json(posts))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PostInput>,
) -> Result<(StatusCode, Json<Post>), ServerError> {
    let draft = input.validate()?;

    if !state.limiters.writes.check(&auth.id).await {
        return Err(ServerError::TooManyRequests);
    }

    let authorized = !state.config.posts_require_approval;
    let post = state.with_db(|db| db.create_post(auth.id, &draft, authorized))?;

    info!(post = %post.id, owner = %auth.id, authorized, "Post published");
    publish_post_change(&state, &post, PostChange::Created).await;
    Ok((StatusCode::CREATED, Json(post)))
}

/// Hidden posts (unauthorized or traded away) are visible only to their
/// owner and to administrators; everyone else gets a 404.
pub async fn get_post(
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<Json<Post>, ServerError> {
    let post = state.with_db(|db| db.get_post(id))?;
    if post.is_public() {
        return Ok(Json(post));
    }

    let Some(viewer) = viewer else {
        return Err(ServerError::NotFound(format!("post {id}")));
    };
    if viewer.id == post.owner_id || is_admin(&state, viewer.id)? {
        Ok(Json(post))
    } else {
        Err(ServerError::NotFound(format!("post {id}")))
    }
}

pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(input): Json<PostUpdateInput>,
) -> Result<Json<Post>, ServerError> {
    let changes = input.validate()?;

    let existing = state.with_db(|db| db.get_post(id))?;
    if existing.owner_id != auth.id {
        return Err(ServerError::Forbidden("Only the owner may edit this post".into()));
    }

    let post = state.with_db(|db| db.update_post(id, &changes))?;
    publish_post_change(&state, &post, PostChange::Updated).await;
    Ok(Json(post))
}

pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<StatusCode, ServerError> {
    let post = state.with_db(|db| db.get_post(id))?;
    if post.owner_id != auth.id && !is_admin(&state, auth.id)? {
        return Err(ServerError::Forbidden("Only the owner may delete this post".into()));
    }

    remove_post(&state, &post).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete `post`, then tell everyone affected: participants of exchanges
/// that were cancelled with it, and all subscribers.
pub(super) async fn remove_post(state: &AppState, post: &Post) -> Result<(), ServerError> {
    let cancelled = state.with_db(|db| db.delete_post(post.id))?;
    info!(post = %post.id, cancelled = cancelled.len(), "Post deleted");

    let reason = format!("\"{}\" is no longer listed", post.title);
    for exchange in &cancelled {
        announce_cancellation(state, exchange, post.owner_id, &reason).await;
    }

    state
        .events
        .broadcast(&ChangeEvent::PostChanged {
            post_id: post.id,
            change: PostChange::Deleted,
        })
        .await;
    Ok(())
}

/// Push a cancelled exchange to both sides and notify everyone but `actor`.
pub(super) async fn announce_cancellation(
    state: &AppState,
    exchange: &Exchange,
    actor: UserId,
    reason: &str,
) {
    let event = ChangeEvent::ExchangeUpdated {
        exchange: to_json(exchange),
    };
    state
        .events
        .publish_to_many(&[exchange.proposer_id, exchange.receiver_id], &event)
        .await;

    for user in [exchange.proposer_id, exchange.receiver_id] {
        if user == actor {
            continue;
        }
        state
            .notify(NewNotification {
                user_id: user,
                kind: NotificationType::ExchangeCancelled,
                title: "Exchange cancelled".into(),
                message: reason.to_string(),
                related_id: Some(exchange.id.0),
            })
            .await;
    }
}

/// Public posts are announced to everyone, hidden ones only to the owner.
pub(super) async fn publish_post_change(state: &AppState, post: &Post, change: PostChange) {
    let event = ChangeEvent::PostChanged {
        post_id: post.id,
        change,
    };
    if post.is_public() {
        state.events.broadcast(&event).await;
    } else {
        state.events.publish_to(post.owner_id, &event).await;
    }
}

fn is_admin(state: &AppState, user: UserId) -> Result<bool, ServerError> {
    match state.with_db(|db| db.get_user(user)) {
        Ok(user) => Ok(user.is_admin),
        Err(ServerError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
