use rusqlite::params;

use truekland_shared::validation::MessageBody;
use truekland_shared::{ChatId, MessageId, UserId};

use crate::chats::row_to_chat;
use crate::database::{fmt_ts, now, parse_ts, parse_uuid, Database};
use crate::error::{Result, StoreError};
use crate::models::{Chat, Message};

impl Database {
    /// Append a message and refresh the chat's last-message cache in one
    /// transaction. Returns the message and the updated chat.
    pub fn insert_message(
        &self,
        chat_id: ChatId,
        sender: UserId,
        body: &MessageBody,
    ) -> Result<(Message, Chat)> {
        let (text, image_url) = match body {
            MessageBody::Text(t) => (Some(t.clone()), None),
            MessageBody::Image(u) => (None, Some(u.clone())),
        };
        let message = Message {
            id: MessageId::new(),
            chat_id,
            sender_id: sender,
            text,
            image_url,
            timestamp: now(),
        };

        let tx = self.conn().unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE chats SET last_message = ?1, last_message_at = ?2, last_sender_id = ?3
             WHERE id = ?4",
            params![
                body.preview(),
                fmt_ts(&message.timestamp),
                sender.to_string(),
                chat_id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }

        tx.execute(
            "INSERT INTO messages (id, chat_id, sender_id, text, image_url, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                chat_id.to_string(),
                sender.to_string(),
                message.text,
                message.image_url,
                fmt_ts(&message.timestamp),
            ],
        )?;

        let chat = tx.query_row(
            "SELECT id, participant_a, participant_b, post_id, last_message,
                    last_message_at, last_sender_id, created_at
             FROM chats WHERE id = ?1",
            params![chat_id.to_string()],
            row_to_chat,
        )?;

        tx.commit()?;
        Ok((message, chat))
    }

    /// Up to `limit` messages sent before the message `before` (the latest
    /// ones when `None`), in chronological order. Messages sharing a
    /// timestamp are ordered by insertion, so paging never skips one. An
    /// unknown cursor yields an empty page.
    pub fn list_messages(
        &self,
        chat_id: ChatId,
        limit: u32,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>> {
        let before = before.map(|b| b.to_string());
        let mut stmt = self.conn().prepare(
            "SELECT id, chat_id, sender_id, text, image_url, timestamp
             FROM messages
             WHERE chat_id = ?1
               AND (?2 IS NULL OR (timestamp, rowid) <
                    (SELECT timestamp, rowid FROM messages WHERE id = ?2))
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![chat_id.to_string(), before, limit],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let chat: String = row.get(1)?;
    let sender: String = row.get(2)?;
    let ts: String = row.get(5)?;

    Ok(Message {
        id: MessageId(parse_uuid(0, &id)?),
        chat_id: ChatId(parse_uuid(1, &chat)?),
        sender_id: UserId(parse_uuid(2, &sender)?),
        text: row.get(3)?,
        image_url: row.get(4)?,
        timestamp: parse_ts(5, &ts)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_user;

    #[test]
    fn send_updates_last_message_cache() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        let (chat, _) = db.get_or_create_chat(ana, ben, None).unwrap();

        let (msg, chat) = db
            .insert_message(chat.id, ana, &MessageBody::Text("hola".into()))
            .unwrap();
        assert_eq!(chat.last_message.as_deref(), Some("hola"));
        assert_eq!(chat.last_sender_id, Some(ana));
        assert_eq!(chat.last_message_at, Some(msg.timestamp));

        let (_, chat) = db
            .insert_message(
                chat.id,
                ben,
                &MessageBody::Image("https://img.example.com/a.png".into()),
            )
            .unwrap();
        assert_eq!(chat.last_message.as_deref(), Some("[image]"));
    }

    #[test]
    fn history_is_chronological_with_cursor() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        let (chat, _) = db.get_or_create_chat(ana, ben, None).unwrap();

        let mut sent = Vec::new();
        for i in 0..4 {
            let (m, _) = db
                .insert_message(chat.id, ana, &MessageBody::Text(format!("m{i}")))
                .unwrap();
            sent.push(m);
        }

        let all = db.list_messages(chat.id, 50, None).unwrap();
        assert_eq!(all, sent);

        let latest_two = db.list_messages(chat.id, 2, None).unwrap();
        assert_eq!(latest_two, sent[2..].to_vec());

        let older = db.list_messages(chat.id, 50, Some(sent[2].id)).unwrap();
        assert_eq!(older, sent[..2].to_vec());

        assert!(db
            .list_messages(chat.id, 50, Some(MessageId::new()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn cursor_keeps_messages_sharing_a_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        let (chat, _) = db.get_or_create_chat(ana, ben, None).unwrap();

        let mut sent = Vec::new();
        for i in 0..3 {
            let (m, _) = db
                .insert_message(chat.id, ben, &MessageBody::Text(format!("m{i}")))
                .unwrap();
            sent.push(m);
        }
        // Same instant for every message.
        db.conn()
            .execute(
                "UPDATE messages SET timestamp = ?1",
                params![fmt_ts(&sent[0].timestamp)],
            )
            .unwrap();

        let page = db.list_messages(chat.id, 1, None).unwrap();
        assert_eq!(page[0].id, sent[2].id);
        let rest = db.list_messages(chat.id, 50, Some(page[0].id)).unwrap();
        let ids: Vec<_> = rest.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![sent[0].id, sent[1].id]);
    }

    #[test]
    fn message_to_missing_chat_fails() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        assert!(matches!(
            db.insert_message(ChatId::new(), ana, &MessageBody::Text("x".into())),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn deleting_chat_removes_messages() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        let (chat, _) = db.get_or_create_chat(ana, ben, None).unwrap();
        db.insert_message(chat.id, ana, &MessageBody::Text("x".into()))
            .unwrap();

        db.delete_chat(chat.id).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
