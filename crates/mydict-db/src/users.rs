use rusqlite::{params, OptionalExtension, Row};

use crate::error::is_constraint_violation;
use crate::models::{ProfileRow, UserRow};
use crate::{now_ts, parse_ts, Database, StoreError};

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        about: row.get(4)?,
        profile_photo_url: row.get(5)?,
        follower_count: row.get(6)?,
        following_count: row.get(7)?,
        entry_count: row.get(8)?,
        topic_count: row.get(9)?,
        created_at: parse_ts(&row.get::<_, String>(10)?),
        last_login_at: row.get::<_, Option<String>>(11)?.map(|s| parse_ts(&s)),
    })
}

const USER_COLUMNS: &str = "id, username, email, password, about, profile_photo_url, \
     follower_count, following_count, entry_count, topic_count, created_at, last_login_at";

impl Database {
    /// Inserts a user row; the UNIQUE constraints on username/email are the
    /// backstop behind the handler's availability checks.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![username, email, password_hash, now_ts()],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::UserExists
                } else {
                    e.into()
                }
            })?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], map_user).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], map_user).optional()?)
        })
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<ProfileRow>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, username, profile_photo_url, entry_count FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(ProfileRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            profile_photo_url: row.get(2)?,
                            entry_count: row.get(3)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn touch_last_login(&self, id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
                params![now_ts(), id],
            )?;
            Ok(())
        })
    }

    /// Cascading account deletion. A single transaction removes every row the
    /// user touches and decrements surviving friends' follower counts; child
    /// rows go first so the foreign keys stay satisfied throughout.
    pub fn delete_account(&self, user_id: i64) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row("SELECT id FROM users WHERE id = ?1", [user_id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::UserNotFound);
            }

            tx.execute(
                "UPDATE users SET follower_count = follower_count - 1
                 WHERE follower_count > 0
                   AND id IN (SELECT friend_id FROM friendships WHERE user_id = ?1)",
                [user_id],
            )?;
            tx.execute(
                "DELETE FROM notifications WHERE user_id = ?1 OR from_user_id = ?1",
                [user_id],
            )?;
            tx.execute(
                "DELETE FROM conversations WHERE user1_id = ?1 OR user2_id = ?1",
                [user_id],
            )?;
            tx.execute(
                "DELETE FROM messages WHERE sender_id = ?1 OR receiver_id = ?1",
                [user_id],
            )?;
            tx.execute(
                "DELETE FROM friendships WHERE user_id = ?1 OR friend_id = ?1",
                [user_id],
            )?;
            tx.execute(
                "DELETE FROM friend_requests WHERE sender_id = ?1 OR receiver_id = ?1",
                [user_id],
            )?;
            tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;

            tx.commit()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{befriend, db_with_users};
    use crate::StoreError;

    #[test]
    fn create_and_fetch_user() {
        let (db, ids) = db_with_users(1);
        let user = db.get_user_by_id(ids[0]).unwrap().expect("user exists");
        assert_eq!(user.username, "user1");
        assert_eq!(user.follower_count, 0);
        assert!(db.get_user_by_username("user1").unwrap().is_some());
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (db, _) = db_with_users(1);
        let err = db
            .create_user("user1", "other@example.com", "hash")
            .unwrap_err();
        assert!(matches!(err, StoreError::UserExists));
    }

    #[test]
    fn delete_account_cascades_and_decrements_followers() {
        let (db, ids) = db_with_users(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        befriend(&db, a, b);
        befriend(&db, a, c);
        db.send_message(a, b, "hello").unwrap();
        db.send_message(b, a, "hi back").unwrap();

        db.delete_account(a).unwrap();

        assert!(db.get_user_by_id(a).unwrap().is_none());
        // Surviving friends lose the edge and the follower credit.
        assert!(db.list_friends(b).unwrap().is_empty());
        assert_eq!(db.get_user_by_id(b).unwrap().unwrap().follower_count, 0);
        assert_eq!(db.get_user_by_id(c).unwrap().unwrap().follower_count, 0);
        assert!(db.list_conversations(b).unwrap().is_empty());
        assert_eq!(db.unread_message_count(b).unwrap(), 0);
    }

    #[test]
    fn delete_account_unknown_user() {
        let (db, _) = db_with_users(1);
        assert!(matches!(
            db.delete_account(999).unwrap_err(),
            StoreError::UserNotFound
        ));
    }
}
