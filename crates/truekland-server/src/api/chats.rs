use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use truekland_shared::events::ChangeEvent;
use truekland_shared::validation::MessageInput;
use truekland_shared::{ChatId, MessageId, NotificationType, PostId, UserId};
use truekland_store::{Chat, Message, NewNotification, StoreError};

use super::{to_json, AppState};
use crate::auth::AuthUser;
use crate::error::ServerError;

const DEFAULT_HISTORY: u32 = 50;
const MAX_HISTORY: u32 = 200;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChatRequest {
    user_id: UserId,
    post_id: Option<PostId>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<u32>,
    /// Id of the oldest message the client already has.
    before: Option<MessageId>,
}

/// Load a chat the caller takes part in. Outsiders get a 404.
fn load_chat(state: &AppState, id: ChatId, user: UserId) -> Result<Chat, ServerError> {
    let chat = state.with_db(|db| db.get_chat(id))?;
    if !chat.has_participant(user) {
        return Err(ServerError::NotFound(format!("chat {id}")));
    }
    Ok(chat)
}

pub async fn list_chats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Chat>>, ServerError> {
    let chats = state.with_db(|db| db.list_chats_for_user(auth.id))?;
    Ok(Json(chats))
}

/// Get or lazily create the chat with another user.
pub async fn open_chat(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<OpenChatRequest>,
) -> Result<(StatusCode, Json<Chat>), ServerError> {
    if req.user_id == auth.id {
        return Err(ServerError::BadRequest("Cannot open a chat with yourself".into()));
    }

    let (chat, created) = state.with_db(|db| -> Result<_, StoreError> {
        db.get_user(req.user_id)?;
        if let Some(post) = req.post_id {
            db.get_post(post)?;
        }
        db.get_or_create_chat(auth.id, req.user_id, req.post_id)
    })?;

    if !created {
        return Ok((StatusCode::OK, Json(chat)));
    }

    tracing::debug!(chat = %chat.id, "Chat opened");
    let event = ChangeEvent::ChatUpdated {
        chat: to_json(&chat),
    };
    state.events.publish_to_many(&chat.participants, &event).await;
    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn get_chat(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ChatId>,
) -> Result<Json<Chat>, ServerError> {
    Ok(Json(load_chat(&state, id, auth.id)?))
}

pub async fn delete_chat(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ChatId>,
) -> Result<StatusCode, ServerError> {
    let chat = load_chat(&state, id, auth.id)?;
    state.with_db(|db| db.delete_chat(id))?;

    tracing::debug!(chat = %id, user = %auth.id, "Chat deleted");
    state
        .events
        .publish_to_many(&chat.participants, &ChangeEvent::ChatDeleted { chat_id: id })
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ChatId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ServerError> {
    load_chat(&state, id, auth.id)?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY);
    let messages = state.with_db(|db| db.list_messages(id, limit, query.before))?;
    Ok(Json(messages))
}

pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ChatId>,
    Json(input): Json<MessageInput>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let body = input.validate()?;
    load_chat(&state, id, auth.id)?;

    if !state.limiters.messages.check(&auth.id).await {
        return Err(ServerError::TooManyRequests);
    }

    let (message, chat) = state.with_db(|db| db.insert_message(id, auth.id, &body))?;

    let participants = chat.participants;
    state
        .events
        .publish_to_many(
            &participants,
            &ChangeEvent::MessageCreated {
                chat_id: id,
                message: to_json(&message),
            },
        )
        .await;
    state
        .events
        .publish_to_many(&participants, &ChangeEvent::ChatUpdated { chat: to_json(&chat) })
        .await;

    let sender_name = state
        .with_db(|db| db.get_user(auth.id))
        .map(|u| u.display_name)
        .unwrap_or_else(|_| "Someone".to_string());
    state
        .notify(NewNotification {
            user_id: chat.other_participant(auth.id),
            kind: NotificationType::NewMessage,
            title: format!("New message from {sender_name}"),
            message: body.preview(),
            related_id: Some(id.0),
        })
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}
