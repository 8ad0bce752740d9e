//! Messaging gate write paths. A message insert and its conversation summary
//! update commit together; the conversation row is keyed by the canonical
//! (min, max) user pair so either send direction lands on the same row.
//! Read-marking is an explicit operation, never a hidden side effect of a
//! fetch query.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::models::{ConversationRow, MessageRow};
use crate::{now_ts, parse_ts, Database, StoreError};

impl Database {
    /// Persists a message between friends and refreshes the pair's
    /// conversation summary in the same transaction. Content is stored
    /// trimmed. Returns the new message id and its timestamp.
    pub fn send_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<(i64, DateTime<Utc>), StoreError> {
        if sender_id == receiver_id {
            return Err(StoreError::SelfMessage);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let friends: Option<i64> = tx
                .query_row(
                    "SELECT id FROM friendships
                     WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                    params![sender_id, receiver_id],
                    |row| row.get(0),
                )
                .optional()?;
            if friends.is_none() {
                return Err(StoreError::NotFriends);
            }

            let created_at = Utc::now();
            let ts = created_at.to_rfc3339();
            tx.execute(
                "INSERT INTO messages (sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![sender_id, receiver_id, content.trim(), ts],
            )?;
            let message_id = tx.last_insert_rowid();

            let (user1, user2) = (sender_id.min(receiver_id), sender_id.max(receiver_id));
            tx.execute(
                "INSERT INTO conversations (user1_id, user2_id, created_at, last_message_at, last_message_id)
                 VALUES (?1, ?2, ?3, ?3, ?4)
                 ON CONFLICT(user1_id, user2_id) DO UPDATE SET
                     last_message_at = excluded.last_message_at,
                     last_message_id = excluded.last_message_id",
                params![user1, user2, ts, message_id],
            )?;

            tx.commit()?;
            Ok((message_id, created_at))
        })
    }

    /// Every conversation touching `user_id`, newest activity first, with the
    /// other participant's profile, the cached last message, and the caller's
    /// unread count for that pair.
    pub fn list_conversations(&self, user_id: i64) -> Result<Vec<ConversationRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.last_message_at,
                        u.id, u.username, u.profile_photo_url,
                        m.content, m.created_at, m.is_read, m.sender_id,
                        (SELECT COUNT(*) FROM messages mm
                          WHERE mm.receiver_id = ?1 AND mm.is_read = 0
                            AND mm.sender_id = CASE WHEN c.user1_id = ?1
                                                    THEN c.user2_id ELSE c.user1_id END)
                 FROM conversations c
                 JOIN users u ON u.id = CASE WHEN c.user1_id = ?1
                                             THEN c.user2_id ELSE c.user1_id END
                 LEFT JOIN messages m ON m.id = c.last_message_id
                 WHERE c.user1_id = ?1 OR c.user2_id = ?1
                 ORDER BY c.last_message_at DESC, c.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        last_message_at: parse_ts(&row.get::<_, String>(1)?),
                        other_id: row.get(2)?,
                        other_username: row.get(3)?,
                        other_photo_url: row.get(4)?,
                        last_content: row.get(5)?,
                        last_created_at: row.get::<_, Option<String>>(6)?.map(|s| parse_ts(&s)),
                        last_is_read: row.get(7)?,
                        last_sender_id: row.get(8)?,
                        unread_count: row.get(9)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One page of the message history between two users, newest first.
    /// The API layer reverses the page for oldest-first delivery.
    pub fn conversation_page(
        &self,
        user_id: i64,
        other_user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let offset = (page.max(1) - 1) as i64 * page_size as i64;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.sender_id, m.receiver_id, m.content, m.is_read,
                        m.read_at, m.created_at, u.username, u.profile_photo_url
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
                    OR (m.sender_id = ?2 AND m.receiver_id = ?1)
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?3 OFFSET ?4",
            )?;
            let rows = stmt
                .query_map(
                    params![user_id, other_user_id, page_size as i64, offset],
                    |row| {
                        Ok(MessageRow {
                            id: row.get(0)?,
                            sender_id: row.get(1)?,
                            receiver_id: row.get(2)?,
                            content: row.get(3)?,
                            is_read: row.get(4)?,
                            read_at: row.get::<_, Option<String>>(5)?.map(|s| parse_ts(&s)),
                            created_at: parse_ts(&row.get::<_, String>(6)?),
                            sender_username: row.get(7)?,
                            sender_photo_url: row.get(8)?,
                        })
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Marks everything `other_user_id` sent to `user_id` as read.
    /// Returns the number of messages flipped.
    pub fn mark_conversation_read(
        &self,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1, read_at = ?1
                 WHERE sender_id = ?2 AND receiver_id = ?3 AND is_read = 0",
                params![now_ts(), other_user_id, user_id],
            )?;
            Ok(changed)
        })
    }

    /// Read receipt for a single message; only its receiver may flip it.
    pub fn mark_message_read(&self, message_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1, read_at = ?1
                 WHERE id = ?2 AND receiver_id = ?3",
                params![now_ts(), message_id, user_id],
            )?;
            if changed == 0 {
                return Err(StoreError::MessageNotFound);
            }
            Ok(())
        })
    }

    pub fn unread_message_count(&self, user_id: i64) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{befriend, db_with_users};
    use crate::StoreError;

    #[test]
    fn messaging_requires_friendship() {
        let (db, ids) = db_with_users(2);
        assert!(matches!(
            db.send_message(ids[0], ids[1], "hi").unwrap_err(),
            StoreError::NotFriends
        ));
        assert!(matches!(
            db.send_message(ids[0], ids[0], "hi").unwrap_err(),
            StoreError::SelfMessage
        ));
    }

    #[test]
    fn both_directions_share_one_conversation() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        befriend(&db, a, b);

        db.send_message(a, b, "first").unwrap();
        db.send_message(b, a, "second").unwrap();

        let a_view = db.list_conversations(a).unwrap();
        let b_view = db.list_conversations(b).unwrap();
        assert_eq!(a_view.len(), 1);
        assert_eq!(b_view.len(), 1);
        assert_eq!(a_view[0].id, b_view[0].id);
        assert_eq!(a_view[0].other_id, b);
        assert_eq!(b_view[0].other_id, a);
        // Summary points at the latest message regardless of direction.
        assert_eq!(a_view[0].last_content.as_deref(), Some("second"));
        assert_eq!(a_view[0].last_sender_id, Some(b));
    }

    #[test]
    fn conversations_order_by_latest_activity() {
        let (db, ids) = db_with_users(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        befriend(&db, a, b);
        befriend(&db, a, c);

        db.send_message(a, b, "to b").unwrap();
        db.send_message(a, c, "to c").unwrap();

        let list = db.list_conversations(a).unwrap();
        assert_eq!(list[0].other_id, c);
        assert_eq!(list[1].other_id, b);

        // A new message to the oldest conversation moves it to the top.
        db.send_message(b, a, "bump").unwrap();
        let list = db.list_conversations(a).unwrap();
        assert_eq!(list[0].other_id, b);
    }

    #[test]
    fn mark_conversation_read_drains_unread_count() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        befriend(&db, a, b);
        for i in 0..4 {
            db.send_message(a, b, &format!("msg {i}")).unwrap();
        }

        let b_view = db.list_conversations(b).unwrap();
        assert_eq!(b_view[0].unread_count, 4);
        assert_eq!(db.unread_message_count(b).unwrap(), 4);

        let marked = db.mark_conversation_read(b, a).unwrap();
        assert_eq!(marked, 4);
        assert_eq!(db.list_conversations(b).unwrap()[0].unread_count, 0);
        assert_eq!(db.unread_message_count(b).unwrap(), 0);

        // Idempotent: nothing left to flip.
        assert_eq!(db.mark_conversation_read(b, a).unwrap(), 0);

        let page = db.conversation_page(b, a, 1, 50).unwrap();
        assert!(page.iter().all(|m| m.is_read && m.read_at.is_some()));
    }

    #[test]
    fn conversation_page_is_newest_first_and_paginates() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        befriend(&db, a, b);
        for i in 1..=5 {
            db.send_message(a, b, &format!("msg {i}")).unwrap();
        }

        let first = db.conversation_page(b, a, 1, 2).unwrap();
        let contents: Vec<&str> = first.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 5", "msg 4"]);

        let last = db.conversation_page(b, a, 3, 2).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].content, "msg 1");
        assert_eq!(last[0].sender_username, "user1");
    }

    #[test]
    fn single_message_read_receipt() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        befriend(&db, a, b);
        let (message_id, _) = db.send_message(a, b, "hello").unwrap();

        // Only the receiver may mark it.
        assert!(matches!(
            db.mark_message_read(message_id, a).unwrap_err(),
            StoreError::MessageNotFound
        ));
        db.mark_message_read(message_id, b).unwrap();

        let page = db.conversation_page(b, a, 1, 50).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "hello");
        assert!(page[0].is_read);
    }

    #[test]
    fn content_is_stored_trimmed() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        befriend(&db, a, b);
        db.send_message(a, b, "  spaced out \n").unwrap();
        let page = db.conversation_page(b, a, 1, 50).unwrap();
        assert_eq!(page[0].content, "spaced out");
    }
}
