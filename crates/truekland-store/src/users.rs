//! CRUD operations for [`User`] records.

use rusqlite::params;

use truekland_shared::validation::ProfileChanges;
use truekland_shared::UserId;

use crate::database::{fmt_ts, now, parse_ts, parse_uuid, Database};
use crate::error::{Result, StoreError};
use crate::models::{User, UserCredentials};

const USER_COLUMNS: &str =
    "id, email, display_name, photo_url, bio, location, is_admin, created_at, updated_at";

impl Database {
    /// Insert a new account. A taken email yields [`StoreError::Conflict`].
    pub fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
        is_admin: bool,
    ) -> Result<User> {
        let ts = now();
        let user = User {
            id: UserId::new(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            photo_url: None,
            bio: None,
            location: None,
            is_admin,
            created_at: ts,
            updated_at: ts,
        };

        self.conn()
            .execute(
                "INSERT INTO users (id, email, password_hash, display_name, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.email,
                    password_hash,
                    user.display_name,
                    user.is_admin,
                    fmt_ts(&ts),
                    fmt_ts(&ts),
                ],
            )
            .map_err(|e| StoreError::from_insert(e, "account with this email"))?;

        tracing::debug!(user = %user.id, "created user");
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    /// Look up an account with its password hash, for login.
    pub fn get_credentials(&self, email: &str) -> Result<UserCredentials> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![email],
                |row| {
                    Ok(UserCredentials {
                        user: row_to_user(row)?,
                        password_hash: row.get(9)?,
                    })
                },
            )
            .map_err(StoreError::from_query)
    }

    pub fn update_profile(&self, id: UserId, changes: &ProfileChanges) -> Result<User> {
        let mut user = self.get_user(id)?;

        if let Some(name) = &changes.display_name {
            user.display_name = name.clone();
        }
        if let Some(bio) = &changes.bio {
            user.bio = bio.clone();
        }
        if let Some(location) = &changes.location {
            user.location = location.clone();
        }
        if let Some(photo) = &changes.photo_url {
            user.photo_url = photo.clone();
        }
        user.updated_at = now();

        self.conn().execute(
            "UPDATE users
             SET display_name = ?1, bio = ?2, location = ?3, photo_url = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                user.display_name,
                user.bio,
                user.location,
                user.photo_url,
                fmt_ts(&user.updated_at),
                id.to_string(),
            ],
        )?;

        Ok(user)
    }

    pub fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET is_admin = ?1 WHERE id = ?2",
            params![is_admin, id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn count_users(&self) -> Result<i64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let created: String = row.get(7)?;
    let updated: String = row.get(8)?;

    Ok(User {
        id: UserId(parse_uuid(0, &id)?),
        email: row.get(1)?,
        display_name: row.get(2)?,
        photo_url: row.get(3)?,
        bio: row.get(4)?,
        location: row.get(5)?,
        is_admin: row.get(6)?,
        created_at: parse_ts(7, &created)?,
        updated_at: parse_ts(8, &updated)?,
    })
}
