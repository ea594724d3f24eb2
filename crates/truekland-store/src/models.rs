//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer. Field names go out in camelCase.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use truekland_shared::{
    Category, ChatId, ExchangeId, ExchangeStatus, MessageId, NotificationId, NotificationType,
    PostId, UserId,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account. The password hash lives only in
/// [`UserCredentials`] and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile as seen by other users (no email).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name,
            photo_url: u.photo_url,
            bio: u.bio,
            location: u.location,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A published barter listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub owner_id: UserId,
    /// Joined from `users` on read.
    pub owner_name: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Estimated value.
    pub price: f64,
    pub images: Vec<String>,
    /// Moderation flag; hidden from browsing when false.
    pub is_authorized: bool,
    /// Cleared once the item has been traded away.
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Whether anonymous browsers can see this listing.
    pub fn is_public(&self) -> bool {
        self.is_authorized && self.is_available
    }
}

/// Browse / search parameters.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category: Option<Category>,
    /// Case-insensitive substring match on title and description.
    pub query: Option<String>,
    pub owner: Option<UserId>,
    /// Include unauthorized and unavailable posts.
    pub include_hidden: bool,
    pub limit: u32,
    pub offset: u32,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation between exactly two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    /// Ordered pair, lower id first.
    pub participants: [UserId; 2],
    pub post_id: Option<PostId>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_sender_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// The participant that is not `user`.
    pub fn other_participant(&self, user: UserId) -> UserId {
        if self.participants[0] == user {
            self.participants[1]
        } else {
            self.participants[0]
        }
    }
}

/// A single chat message. Exactly one of `text` and `image_url` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// A proposal to trade `offered_post_id` for `requested_post_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: ExchangeId,
    pub proposer_id: UserId,
    pub receiver_id: UserId,
    pub offered_post_id: PostId,
    pub requested_post_id: PostId,
    pub status: ExchangeStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exchange {
    pub fn involves(&self, user: UserId) -> bool {
        self.proposer_id == user || self.receiver_id == user
    }

    pub fn counterparty(&self, user: UserId) -> UserId {
        if self.proposer_id == user {
            self.receiver_id
        } else {
            self.proposer_id
        }
    }
}

/// Result of a successful status move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub exchange: Exchange,
    /// Other open exchanges on the same posts, cancelled because a
    /// completion took those posts off the market.
    pub superseded: Vec<Exchange>,
}

/// Which side of exchanges to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeRole {
    #[default]
    Any,
    Proposer,
    Receiver,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Post, chat or exchange the notification points at.
    pub related_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Aggregate counts for the moderation dashboard.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStats {
    pub users: i64,
    pub posts: i64,
    pub unauthorized_posts: i64,
    pub chats: i64,
    pub exchanges_by_status: BTreeMap<String, i64>,
}
