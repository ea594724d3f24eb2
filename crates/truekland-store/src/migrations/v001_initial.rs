//! v001 -- Initial schema creation.
//!
//! Creates the `users` and `posts` tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email         TEXT NOT NULL UNIQUE,        -- normalized lowercase
    password_hash TEXT NOT NULL,               -- Argon2id PHC string
    display_name  TEXT NOT NULL,
    photo_url     TEXT,
    bio           TEXT,
    location      TEXT,
    is_admin      INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at    TEXT NOT NULL,               -- RFC-3339, UTC, micros
    updated_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Posts (listings)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id      TEXT NOT NULL,               -- FK -> users(id)
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    category      TEXT NOT NULL,
    price         REAL NOT NULL,
    images        TEXT NOT NULL,               -- JSON array of URLs
    is_authorized INTEGER NOT NULL DEFAULT 1,
    is_available  INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_owner ON posts(owner_id);
CREATE INDEX IF NOT EXISTS idx_posts_browse
    ON posts(is_authorized, is_available, category, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
