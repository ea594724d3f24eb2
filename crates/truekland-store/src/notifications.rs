use rusqlite::params;

use truekland_shared::{NotificationId, UserId};

use crate::database::{fmt_ts, now, parse_enum, parse_ts, parse_uuid, Database};
use crate::error::{Result, StoreError};
use crate::models::{NewNotification, Notification};

impl Database {
    pub fn create_notification(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: NotificationId::new(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            related_id: new.related_id,
            read: false,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO notifications (id, user_id, kind, title, message, related_id, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.kind.as_str(),
                notification.title,
                notification.message,
                notification.related_id.map(|r| r.to_string()),
                fmt_ts(&notification.created_at),
            ],
        )?;

        Ok(notification)
    }

    /// Newest first.
    pub fn list_notifications(
        &self,
        user: UserId,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, kind, title, message, related_id, read, created_at
             FROM notifications
             WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![user.to_string(), unread_only, limit], row_to_notification)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn count_unread_notifications(&self, user: UserId) -> Result<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
            params![user.to_string()],
            |row| row.get(0),
        )?)
    }

    /// Flip the read flag. Scoped to `user`: returns `false` when the
    /// notification does not exist or belongs to someone else.
    pub fn mark_notification_read(&self, id: NotificationId, user: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn mark_all_notifications_read(&self, user: UserId) -> Result<usize> {
        Ok(self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            params![user.to_string()],
        )?)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id: String = row.get(0)?;
    let user: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let related: Option<String> = row.get(5)?;
    let created: String = row.get(7)?;

    Ok(Notification {
        id: NotificationId(parse_uuid(0, &id)?),
        user_id: UserId(parse_uuid(1, &user)?),
        kind: parse_enum(2, &kind)?,
        title: row.get(3)?,
        message: row.get(4)?,
        related_id: related.map(|r| parse_uuid(5, &r)).transpose()?,
        read: row.get(6)?,
        created_at: parse_ts(7, &created)?,
    })
}
