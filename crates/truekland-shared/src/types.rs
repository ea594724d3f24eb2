use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Account identifier.
    UserId
);
uuid_id!(
    /// Listing identifier.
    PostId
);
uuid_id!(ChatId);
uuid_id!(MessageId);
uuid_id!(ExchangeId);
uuid_id!(NotificationId);

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Listing category used for browsing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronics,
    Clothing,
    Home,
    Books,
    Sports,
    Toys,
    Vehicles,
    Tools,
    Music,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Electronics,
        Category::Clothing,
        Category::Home,
        Category::Books,
        Category::Sports,
        Category::Toys,
        Category::Vehicles,
        Category::Tools,
        Category::Music,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Home => "home",
            Category::Books => "books",
            Category::Sports => "sports",
            Category::Toys => "toys",
            Category::Vehicles => "vehicles",
            Category::Tools => "tools",
            Category::Music => "music",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("category", s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Exchange status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Accepted => "accepted",
            ExchangeStatus::Rejected => "rejected",
            ExchangeStatus::Completed => "completed",
            ExchangeStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeStatus::Rejected | ExchangeStatus::Completed | ExchangeStatus::Cancelled
        )
    }
}

impl FromStr for ExchangeStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExchangeStatus::Pending),
            "accepted" => Ok(ExchangeStatus::Accepted),
            "rejected" => Ok(ExchangeStatus::Rejected),
            "completed" => Ok(ExchangeStatus::Completed),
            "cancelled" => Ok(ExchangeStatus::Cancelled),
            other => Err(ParseEnumError::new("exchange status", other)),
        }
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Notification type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ExchangeProposed,
    ExchangeAccepted,
    ExchangeRejected,
    ExchangeCompleted,
    ExchangeCancelled,
    NewMessage,
    PostModerated,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ExchangeProposed => "exchange_proposed",
            NotificationType::ExchangeAccepted => "exchange_accepted",
            NotificationType::ExchangeRejected => "exchange_rejected",
            NotificationType::ExchangeCompleted => "exchange_completed",
            NotificationType::ExchangeCancelled => "exchange_cancelled",
            NotificationType::NewMessage => "new_message",
            NotificationType::PostModerated => "post_moderated",
            NotificationType::System => "system",
        }
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exchange_proposed" => Ok(NotificationType::ExchangeProposed),
            "exchange_accepted" => Ok(NotificationType::ExchangeAccepted),
            "exchange_rejected" => Ok(NotificationType::ExchangeRejected),
            "exchange_completed" => Ok(NotificationType::ExchangeCompleted),
            "exchange_cancelled" => Ok(NotificationType::ExchangeCancelled),
            "new_message" => Ok(NotificationType::NewMessage),
            "post_moderated" => Ok(NotificationType::PostModerated),
            "system" => Ok(NotificationType::System),
            other => Err(ParseEnumError::new("notification type", other)),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
