//! Barter proposals and their lifecycle.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use truekland_shared::events::{ChangeEvent, PostChange};
use truekland_shared::exchange::{plan_transition, ExchangeAction, Role};
use truekland_shared::validation::ExchangeProposalInput;
use truekland_shared::{ExchangeId, ExchangeStatus, NotificationType, UserId};
use truekland_store::{Exchange, ExchangeRole, NewNotification, StoreError, Transition};

use super::posts::{announce_cancellation, publish_post_change};
use super::{to_json, AppState};
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    role: ExchangeRole,
    status: Option<ExchangeStatus>,
}

fn load_exchange(state: &AppState, id: ExchangeId, user: UserId) -> Result<Exchange, ServerError> {
    let exchange = state.with_db(|db| db.get_exchange(id))?;
    if !exchange.involves(user) {
        return Err(ServerError::NotFound(format!("exchange {id}")));
    }
    Ok(exchange)
}

async fn publish_exchange(state: &AppState, exchange: &Exchange) {
    let event = ChangeEvent::ExchangeUpdated {
        exchange: to_json(exchange),
    };
    state
        .events
        .publish_to_many(&[exchange.proposer_id, exchange.receiver_id], &event)
        .await;
}

pub async fn list_exchanges(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Exchange>>, ServerError> {
    let exchanges =
        state.with_db(|db| db.list_exchanges_for_user(auth.id, query.role, query.status))?;
    Ok(Json(exchanges))
}

pub async fn get_exchange(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ExchangeId>,
) -> Result<Json<Exchange>, ServerError> {
    Ok(Json(load_exchange(&state, id, auth.id)?))
}

/// Offer one of the caller's posts for someone else's.
pub async fn propose_exchange(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ExchangeProposalInput>,
) -> Result<(StatusCode, Json<Exchange>), ServerError> {
    let proposal = input.validate()?;

    if !state.limiters.writes.check(&auth.id).await {
        return Err(ServerError::TooManyRequests);
    }

    let (offered, requested) = state.with_db(|db| -> Result<_, StoreError> {
        Ok((
            db.get_post(proposal.offered_post_id)?,
            db.get_post(proposal.requested_post_id)?,
        ))
    })?;

    if offered.owner_id != auth.id {
        return Err(ServerError::Forbidden("You can only offer your own posts".into()));
    }
    if requested.owner_id == auth.id {
        return Err(ServerError::BadRequest(
            "Cannot propose an exchange for your own post".into(),
        ));
    }
    if !offered.is_public() || !requested.is_public() {
        return Err(ServerError::Conflict("Both posts must be available".into()));
    }

    let exchange = state.with_db(|db| -> Result<_, StoreError> {
        if db.has_pending_exchange(offered.id, requested.id)? {
            return Err(StoreError::Conflict(
                "An exchange for these posts is already pending".into(),
            ));
        }
        db.create_exchange(auth.id, requested.owner_id, &proposal)
    })?;

    info!(
        exchange = %exchange.id,
        proposer = %auth.id,
        receiver = %exchange.receiver_id,
        "Exchange proposed"
    );

    publish_exchange(&state, &exchange).await;
    state
        .notify(NewNotification {
            user_id: exchange.receiver_id,
            kind: NotificationType::ExchangeProposed,
            title: "New exchange proposal".into(),
            message: format!(
                "{} offers \"{}\" for your \"{}\"",
                offered.owner_name, offered.title, requested.title
            ),
            related_id: Some(exchange.id.0),
        })
        .await;

    Ok((StatusCode::CREATED, Json(exchange)))
}

/// `POST /exchanges/:id/:action` where action is accept, reject, complete
/// or cancel.
pub async fn transition_exchange(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, action)): Path<(ExchangeId, String)>,
) -> Result<Json<Exchange>, ServerError> {
    let action = ExchangeAction::parse(&action)
        .ok_or_else(|| ServerError::NotFound(format!("exchange action {action}")))?;

    let current = load_exchange(&state, id, auth.id)?;
    let role = if current.proposer_id == auth.id {
        Role::Proposer
    } else {
        Role::Receiver
    };

    let target = plan_transition(current.status, action, role)?;
    let Transition {
        exchange,
        superseded,
    } = state.with_db(|db| db.transition_exchange(id, current.status, target))?;

    info!(
        exchange = %id,
        user = %auth.id,
        from = %current.status,
        to = %target,
        superseded = superseded.len(),
        "Exchange transitioned"
    );

    publish_exchange(&state, &exchange).await;

    let (kind, title) = match target {
        ExchangeStatus::Accepted => (NotificationType::ExchangeAccepted, "Exchange accepted"),
        ExchangeStatus::Rejected => (NotificationType::ExchangeRejected, "Exchange rejected"),
        ExchangeStatus::Completed => (NotificationType::ExchangeCompleted, "Exchange completed"),
        ExchangeStatus::Cancelled => (NotificationType::ExchangeCancelled, "Exchange cancelled"),
        ExchangeStatus::Pending => (NotificationType::System, "Exchange updated"),
    };
    let actor = state
        .with_db(|db| db.get_user(auth.id))
        .map(|u| u.display_name)
        .unwrap_or_else(|_| "The other party".to_string());
    state
        .notify(NewNotification {
            user_id: exchange.counterparty(auth.id),
            kind,
            title: title.into(),
            message: format!("{actor} marked your exchange as {target}"),
            related_id: Some(id.0),
        })
        .await;

    if target == ExchangeStatus::Completed {
        let reason = "One of the items in this exchange has already been traded";
        for other in &superseded {
            announce_cancellation(&state, other, auth.id, reason).await;
        }
        for post_id in [exchange.offered_post_id, exchange.requested_post_id] {
            if let Ok(post) = state.with_db(|db| db.get_post(post_id)) {
                publish_post_change(&state, &post, PostChange::Updated).await;
            }
        }
    }

    Ok(Json(exchange))
}
