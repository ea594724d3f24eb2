//! # truekland-store
//!
//! SQLite persistence for the TrueKland marketplace.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. State changes that must not race (exchange status moves, message
//! append + chat cache refresh, post deletion) run inside a transaction.

pub mod chats;
pub mod database;
pub mod exchanges;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod stats;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
