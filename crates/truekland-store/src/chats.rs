//! CRUD operations for [`Chat`] records.

use rusqlite::{params, OptionalExtension};

use truekland_shared::{ChatId, PostId, UserId};

use crate::database::{fmt_ts, now, parse_ts, parse_uuid, Database};
use crate::error::{Result, StoreError};
use crate::models::Chat;

const CHAT_COLUMNS: &str = "id, participant_a, participant_b, post_id, last_message,
        last_message_at, last_sender_id, created_at";

/// Canonical ordering of a participant pair.
fn ordered(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Database {
    /// Return the chat between `a` and `b`, creating it on first contact.
    ///
    /// The boolean is `true` when the chat was created by this call. An
    /// existing chat keeps its original `post_id`.
    pub fn get_or_create_chat(
        &self,
        a: UserId,
        b: UserId,
        post_id: Option<PostId>,
    ) -> Result<(Chat, bool)> {
        if a == b {
            return Err(StoreError::Conflict("cannot open a chat with yourself".into()));
        }
        let (low, high) = ordered(a, b);

        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO chats (id, participant_a, participant_b, post_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ChatId::new().to_string(),
                low.to_string(),
                high.to_string(),
                post_id.map(|p| p.to_string()),
                fmt_ts(&now()),
            ],
        )?;

        let chat = self
            .find_chat_between(low, high)?
            .ok_or(StoreError::NotFound)?;

        if inserted > 0 {
            tracing::debug!(chat = %chat.id, "created chat");
        }
        Ok((chat, inserted > 0))
    }

    pub fn find_chat_between(&self, a: UserId, b: UserId) -> Result<Option<Chat>> {
        let (low, high) = ordered(a, b);
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {CHAT_COLUMNS} FROM chats WHERE participant_a = ?1 AND participant_b = ?2"
                ),
                params![low.to_string(), high.to_string()],
                row_to_chat,
            )
            .optional()?)
    }

    pub fn get_chat(&self, id: ChatId) -> Result<Chat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id.to_string()],
                row_to_chat,
            )
            .map_err(StoreError::from_query)
    }

    /// Chats of `user`, most recently active first.
    pub fn list_chats_for_user(&self, user: UserId) -> Result<Vec<Chat>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY COALESCE(last_message_at, created_at) DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], row_to_chat)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Delete a chat and, through ON DELETE CASCADE, all of its messages.
    pub fn delete_chat(&self, id: ChatId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM chats WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    pub fn count_chats(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))?)
    }
}

pub(crate) fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id: String = row.get(0)?;
    let a: String = row.get(1)?;
    let b: String = row.get(2)?;
    let post: Option<String> = row.get(3)?;
    let last_at: Option<String> = row.get(5)?;
    let last_sender: Option<String> = row.get(6)?;
    let created: String = row.get(7)?;

    Ok(Chat {
        id: ChatId(parse_uuid(0, &id)?),
        participants: [UserId(parse_uuid(1, &a)?), UserId(parse_uuid(2, &b)?)],
        post_id: post.map(|p| parse_uuid(3, &p).map(PostId)).transpose()?,
        last_message: row.get(4)?,
        last_message_at: last_at.map(|t| parse_ts(5, &t)).transpose()?,
        last_sender_id: last_sender
            .map(|s| parse_uuid(6, &s).map(UserId))
            .transpose()?,
        created_at: parse_ts(7, &created)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_user;

    #[test]
    fn get_or_create_is_idempotent_and_unordered() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");

        let (first, created) = db.get_or_create_chat(ana, ben, None).unwrap();
        assert!(created);
        let (second, created_again) = db.get_or_create_chat(ben, ana, None).unwrap();
        assert!(!created_again);
        assert_eq!(first.id, second.id);
        assert!(first.participants[0] < first.participants[1]);
        assert!(first.has_participant(ana) && first.has_participant(ben));
        assert_eq!(first.other_participant(ana), ben);
    }

    #[test]
    fn chat_with_self_is_refused() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        assert!(matches!(
            db.get_or_create_chat(ana, ana, None),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn list_only_own_chats() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        let cat = seed_user(&db, "cat");

        db.get_or_create_chat(ana, ben, None).unwrap();
        db.get_or_create_chat(ben, cat, None).unwrap();

        assert_eq!(db.list_chats_for_user(ana).unwrap().len(), 1);
        assert_eq!(db.list_chats_for_user(ben).unwrap().len(), 2);
        assert_eq!(db.count_chats().unwrap(), 2);
    }

    #[test]
    fn delete_chat() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        let (chat, _) = db.get_or_create_chat(ana, ben, None).unwrap();

        assert!(db.delete_chat(chat.id).unwrap());
        assert!(!db.delete_chat(chat.id).unwrap());
        assert!(matches!(db.get_chat(chat.id), Err(StoreError::NotFound)));
    }
}
