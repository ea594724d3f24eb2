//! Types and rules shared by the TrueKland store and server: identifiers,
//! enumerations, input sanitization and validation, session tokens, the
//! exchange lifecycle and realtime event payloads.

pub mod constants;
pub mod error;
pub mod events;
pub mod exchange;
pub mod sanitize;
pub mod session;
pub mod types;
pub mod validation;

pub use error::{FieldError, SessionError, TransitionError, ValidationErrors};
pub use types::{
    Category, ChatId, ExchangeId, ExchangeStatus, MessageId, NotificationId, NotificationType,
    PostId, UserId,
};
