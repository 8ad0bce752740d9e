pub mod error;
pub mod friends;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

pub use error::StoreError;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database, used by the test suites.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// Timestamps are written as RFC 3339; older rows created through SQLite's
/// `datetime('now')` default lack the timezone suffix, so fall back to the
/// naive format before giving up.
pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

pub(crate) fn now_ts() -> String {
    Utc::now().to_rfc3339()
}


#[cfg(test)]
pub(crate) mod testutil {
    use super::Database;

    /// Fresh in-memory store with `n` registered users; returns their ids.
    pub fn db_with_users(n: usize) -> (Database, Vec<i64>) {
        let db = Database::open_in_memory().expect("open in-memory db");
        let ids = (0..n)
            .map(|i| {
                db.create_user(
                    &format!("user{}", i + 1),
                    &format!("user{}@example.com", i + 1),
                    "argon2-hash-placeholder",
                )
                .expect("create user")
            })
            .collect();
        (db, ids)
    }

    /// Shortcut: pending request plus acceptance, leaving the two users friends.
    pub fn befriend(db: &Database, a: i64, b: i64) {
        let outcome = db.send_friend_request(a, b).expect("send request");
        let request_id = match outcome {
            crate::friends::SendRequestOutcome::Sent { request_id } => request_id,
            other => panic!("unexpected outcome: {:?}", other),
        };
        db.accept_friend_request(request_id, b).expect("accept request");
    }
}
