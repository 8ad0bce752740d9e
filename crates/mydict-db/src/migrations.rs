use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            username            TEXT NOT NULL UNIQUE,
            email               TEXT NOT NULL UNIQUE,
            password            TEXT NOT NULL,
            about               TEXT,
            profile_photo_url   TEXT,
            follower_count      INTEGER NOT NULL DEFAULT 0,
            following_count     INTEGER NOT NULL DEFAULT 0,
            entry_count         INTEGER NOT NULL DEFAULT 0,
            topic_count         INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            last_login_at       TEXT
        );

        CREATE TABLE IF NOT EXISTS friend_requests (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            receiver_id INTEGER NOT NULL REFERENCES users(id),
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- At most one pending request per direction; terminal rows are kept
        -- and never block a new request.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_pending
            ON friend_requests(sender_id, receiver_id) WHERE status = 'pending';

        CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
            ON friend_requests(receiver_id, status);

        CREATE TABLE IF NOT EXISTS friendships (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            friend_id   INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            receiver_id INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            is_read     INTEGER NOT NULL DEFAULT 0,
            read_at     TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_id, receiver_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(receiver_id, is_read);

        -- One row per unordered user pair: user1_id < user2_id always holds.
        CREATE TABLE IF NOT EXISTS conversations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user1_id        INTEGER NOT NULL REFERENCES users(id),
            user2_id        INTEGER NOT NULL REFERENCES users(id),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            last_message_at TEXT NOT NULL DEFAULT (datetime('now')),
            last_message_id INTEGER REFERENCES messages(id),
            UNIQUE(user1_id, user2_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL REFERENCES users(id),
            from_user_id INTEGER REFERENCES users(id),
            type         TEXT NOT NULL,
            content      TEXT NOT NULL,
            data         TEXT,
            is_read      INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
