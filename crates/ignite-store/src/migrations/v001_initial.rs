//! v001 -- Initial schema: `rooms`, `messages`, `room_members`.
//!
//! Timestamps are fixed-width RFC-3339 UTC strings with microsecond
//! precision, so text comparison orders them chronologically.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Rooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS rooms (
    id          TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name        TEXT NOT NULL,
    visibility  TEXT NOT NULL DEFAULT 'public',
    owner_name  TEXT NOT NULL,
    session_id  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rooms_updated ON rooms(updated_at DESC);

-- ----------------------------------------------------------------
-- Messages (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id     TEXT NOT NULL,
    user_name   TEXT NOT NULL,
    body        TEXT NOT NULL,
    media_url   TEXT,
    media_type  TEXT,
    created_at  TEXT NOT NULL,

    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_room_ts
    ON messages(room_id, created_at, id);

-- ----------------------------------------------------------------
-- Room membership / presence
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS room_members (
    room_id       TEXT NOT NULL,
    user_name     TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    is_owner      INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1

    PRIMARY KEY (room_id, user_name),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_room_members_activity
    ON room_members(room_id, last_activity);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
