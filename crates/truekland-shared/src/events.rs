use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ChatId, PostId};

/// Change notifications pushed to realtime subscribers.
///
/// Payload fields carry the same JSON documents the REST API returns, so a
/// client can apply an event without re-fetching. Field names are camelCase
/// like those documents; the `type` tag stays snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChangeEvent {
    MessageCreated { chat_id: ChatId, message: Value },

    /// Chat created or its last-message cache moved
    ChatUpdated { chat: Value },

    ChatDeleted { chat_id: ChatId },

    ExchangeUpdated { exchange: Value },

    NotificationCreated { notification: Value },

    PostChanged { post_id: PostId, change: PostChange },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostChange {
    Created,
    Updated,
    Deleted,
    Moderated,
}

impl ChangeEvent {
    /// Event name used on the wire (the SSE `event:` field).
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::MessageCreated { .. } => "message_created",
            ChangeEvent::ChatUpdated { .. } => "chat_updated",
            ChangeEvent::ChatDeleted { .. } => "chat_deleted",
            ChangeEvent::ExchangeUpdated { .. } => "exchange_updated",
            ChangeEvent::NotificationCreated { .. } => "notification_created",
            ChangeEvent::PostChanged { .. } => "post_changed",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_representation() {
        let id = ChatId::new();
        let event = ChangeEvent::ChatDeleted { chat_id: id };
        let json: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "chat_deleted");
        assert_eq!(json["chatId"], id.to_string());
        assert!(json.get("chat_id").is_none());
        assert_eq!(event.name(), "chat_deleted");
    }

    #[test]
    fn post_change_names() {
        let event = ChangeEvent::PostChanged {
            post_id: PostId::new(),
            change: PostChange::Moderated,
        };
        let json: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], event.name());
        assert_eq!(json["change"], "moderated");
        assert!(json["postId"].is_string());
    }
}
