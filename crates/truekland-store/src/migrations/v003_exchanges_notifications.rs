use rusqlite::Connection;

// Exchanges keep post ids without a foreign key: the record outlives the
// listings it mentions.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS exchanges (
    id                TEXT PRIMARY KEY NOT NULL,
    proposer_id       TEXT NOT NULL,
    receiver_id       TEXT NOT NULL,
    offered_post_id   TEXT NOT NULL,
    requested_post_id TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending',
    message           TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_exchanges_proposer ON exchanges(proposer_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_exchanges_receiver ON exchanges(receiver_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_exchanges_posts ON exchanges(offered_post_id, requested_post_id);

CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    kind       TEXT NOT NULL,
    title      TEXT NOT NULL,
    message    TEXT NOT NULL,
    related_id TEXT,
    read       INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, read, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
