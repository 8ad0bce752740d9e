//! Notification rows are a plain append-only feed: the fan-out helpers in the
//! API layer insert here and the owner lists, flips, or deletes them.

use rusqlite::params;

use mydict_types::models::NotificationType;

use crate::models::{NotificationRow, ProfileRow};
use crate::{now_ts, parse_ts, Database, StoreError};

impl Database {
    pub fn insert_notification(
        &self,
        user_id: i64,
        from_user_id: Option<i64>,
        kind: NotificationType,
        content: &str,
        data: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, from_user_id, type, content, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, from_user_id, kind.as_str(), content, data, now_ts()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// One page of the user's feed, newest first, plus the total and unread
    /// counts the list view displays.
    pub fn list_notifications(
        &self,
        user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<NotificationRow>, i64, i64), StoreError> {
        let offset = (page.max(1) - 1) as i64 * page_size as i64;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.type, n.content, n.data, n.is_read, n.created_at,
                        u.id, u.username, u.profile_photo_url, u.entry_count
                 FROM notifications n
                 LEFT JOIN users u ON u.id = n.from_user_id
                 WHERE n.user_id = ?1
                 ORDER BY n.created_at DESC, n.id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, page_size as i64, offset], |row| {
                    let kind: String = row.get(1)?;
                    let from_id: Option<i64> = row.get(6)?;
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        kind: NotificationType::parse(&kind).unwrap_or(NotificationType::System),
                        content: row.get(2)?,
                        data: row.get(3)?,
                        is_read: row.get(4)?,
                        created_at: parse_ts(&row.get::<_, String>(5)?),
                        from_user: from_id.map(|id| {
                            Ok::<_, rusqlite::Error>(ProfileRow {
                                id,
                                username: row.get(7)?,
                                profile_photo_url: row.get(8)?,
                                entry_count: row.get(9)?,
                            })
                        })
                        .transpose()?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            let unread: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok((rows, total, unread))
        })
    }

    pub fn unread_notification_count(&self, user_id: i64) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                params![notification_id, user_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotificationNotFound);
            }
            Ok(())
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: i64) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id],
            )?)
        })
    }

    /// Owner-only delete; the feed is otherwise append-only.
    pub fn delete_notification(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                params![notification_id, user_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotificationNotFound);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::db_with_users;
    use crate::StoreError;
    use mydict_types::models::NotificationType;

    #[test]
    fn feed_pages_newest_first_with_counts() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        for i in 1..=5 {
            db.insert_notification(
                a,
                Some(b),
                NotificationType::System,
                &format!("note {i}"),
                None,
            )
            .unwrap();
        }

        let (page, total, unread) = db.list_notifications(a, 1, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(unread, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "note 5");
        assert_eq!(page[1].content, "note 4");
        assert_eq!(page[0].from_user.as_ref().unwrap().username, "user2");

        let (page, _, _) = db.list_notifications(a, 3, 2).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "note 1");
    }

    #[test]
    fn data_payload_round_trips_as_json() {
        let (db, ids) = db_with_users(2);
        let data = serde_json::json!({"actorId": ids[1], "preview": "hey"}).to_string();
        db.insert_notification(
            ids[0],
            Some(ids[1]),
            NotificationType::NewMessage,
            "user2 sent you a new message: hey",
            Some(&data),
        )
        .unwrap();

        let (page, _, _) = db.list_notifications(ids[0], 1, 20).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(page[0].data.as_deref().unwrap()).unwrap();
        assert_eq!(parsed["actorId"], ids[1]);
        assert_eq!(page[0].kind, NotificationType::NewMessage);
    }

    #[test]
    fn read_flips_are_owner_scoped() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        let id = db
            .insert_notification(a, None, NotificationType::System, "hello", None)
            .unwrap();

        assert!(matches!(
            db.mark_notification_read(id, b).unwrap_err(),
            StoreError::NotificationNotFound
        ));
        db.mark_notification_read(id, a).unwrap();
        assert_eq!(db.unread_notification_count(a).unwrap(), 0);
    }

    #[test]
    fn mark_all_and_delete() {
        let (db, ids) = db_with_users(2);
        let (a, b) = (ids[0], ids[1]);
        let first = db
            .insert_notification(a, None, NotificationType::System, "one", None)
            .unwrap();
        db.insert_notification(a, None, NotificationType::System, "two", None)
            .unwrap();

        assert_eq!(db.mark_all_notifications_read(a).unwrap(), 2);
        assert_eq!(db.unread_notification_count(a).unwrap(), 0);

        assert!(matches!(
            db.delete_notification(first, b).unwrap_err(),
            StoreError::NotificationNotFound
        ));
        db.delete_notification(first, a).unwrap();
        let (_, total, _) = db.list_notifications(a, 1, 20).unwrap();
        assert_eq!(total, 1);
    }
}
