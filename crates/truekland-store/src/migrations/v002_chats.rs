use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id              TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    participant_a   TEXT NOT NULL,               -- lower user id of the pair
    participant_b   TEXT NOT NULL,               -- higher user id of the pair
    post_id         TEXT,                        -- listing that started the chat
    last_message    TEXT,
    last_message_at TEXT,
    last_sender_id  TEXT,
    created_at      TEXT NOT NULL,

    CHECK (participant_a < participant_b),
    FOREIGN KEY (participant_a) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (participant_b) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE SET NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_pair ON chats(participant_a, participant_b);
CREATE INDEX IF NOT EXISTS idx_chats_b ON chats(participant_b);

CREATE TABLE IF NOT EXISTS messages (
    id        TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    chat_id   TEXT NOT NULL,               -- FK -> chats(id)
    sender_id TEXT NOT NULL,
    text      TEXT,
    image_url TEXT,
    timestamp TEXT NOT NULL,

    CHECK ((text IS NULL) <> (image_url IS NULL)),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts ON messages(chat_id, timestamp);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
