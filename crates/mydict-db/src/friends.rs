//! Friend graph write paths. Every multi-row mutation (accept, the
//! auto-accept branch of send) runs inside one transaction so the request
//! status, the mirrored friendship edges, and the follower counters can never
//! diverge. Follower counters are touched here and in account deletion only.

use rusqlite::{params, Connection, OptionalExtension, Row};

use mydict_types::models::FriendRequestStatus;

use crate::error::is_constraint_violation;
use crate::models::{FriendRequestRow, FriendRow, ProfileRow, RequestWithProfile};
use crate::{now_ts, parse_ts, Database, StoreError};

#[derive(Debug)]
pub enum SendRequestOutcome {
    /// A new pending request was created.
    Sent { request_id: i64 },
    /// A pending request already existed in the reverse direction, so the
    /// send doubled as an accept of that request.
    AutoAccepted(AcceptedFriendship),
}

#[derive(Debug)]
pub struct AcceptedFriendship {
    pub request_id: i64,
    /// The user who originally sent the request.
    pub sender_id: i64,
    /// The user who accepted it.
    pub receiver_id: i64,
}

impl Database {
    pub fn send_friend_request(
        &self,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<SendRequestOutcome, StoreError> {
        if sender_id == receiver_id {
            return Err(StoreError::SelfRequest);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let receiver: Option<i64> = tx
                .query_row("SELECT id FROM users WHERE id = ?1", [receiver_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if receiver.is_none() {
                return Err(StoreError::UserNotFound);
            }

            if friendship_exists(&tx, sender_id, receiver_id)? {
                return Err(StoreError::AlreadyFriends);
            }

            let pending: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT id, sender_id FROM friend_requests
                     WHERE status = 'pending'
                       AND ((sender_id = ?1 AND receiver_id = ?2)
                         OR (sender_id = ?2 AND receiver_id = ?1))",
                    params![sender_id, receiver_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            if let Some((request_id, pending_sender)) = pending {
                if pending_sender == sender_id {
                    return Err(StoreError::DuplicateRequest);
                }
                // Reverse pending request: both sides want the friendship,
                // accept it on the spot instead of stacking a second request.
                let accepted = accept_pending(&tx, request_id, sender_id)?;
                tx.commit()?;
                return Ok(SendRequestOutcome::AutoAccepted(accepted));
            }

            tx.execute(
                "INSERT INTO friend_requests (sender_id, receiver_id, status, created_at)
                 VALUES (?1, ?2, 'pending', ?3)",
                params![sender_id, receiver_id, now_ts()],
            )
            .map_err(|e| {
                // A racing send in the same direction hits the pending unique
                // index; report it exactly like the check above would have.
                if is_constraint_violation(&e) {
                    StoreError::DuplicateRequest
                } else {
                    StoreError::from(e)
                }
            })?;
            let request_id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(SendRequestOutcome::Sent { request_id })
        })
    }

    pub fn accept_friend_request(
        &self,
        request_id: i64,
        accepting_user_id: i64,
    ) -> Result<AcceptedFriendship, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let accepted = accept_pending(&tx, request_id, accepting_user_id)?;
            tx.commit()?;
            Ok(accepted)
        })
    }

    pub fn reject_friend_request(
        &self,
        request_id: i64,
        rejecting_user_id: i64,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE friend_requests SET status = 'rejected'
                 WHERE id = ?1 AND receiver_id = ?2 AND status = 'pending'",
                params![request_id, rejecting_user_id],
            )?;
            if changed == 0 {
                return Err(StoreError::RequestNotFound);
            }
            Ok(())
        })
    }

    pub fn get_friend_request(&self, id: i64) -> Result<Option<FriendRequestRow>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, sender_id, receiver_id, status, created_at
                     FROM friend_requests WHERE id = ?1",
                    [id],
                    map_request,
                )
                .optional()?)
        })
    }

    /// Pending requests received by `user_id`, newest first.
    pub fn incoming_requests(&self, user_id: i64) -> Result<Vec<RequestWithProfile>, StoreError> {
        self.list_pending(user_id, /* incoming */ true)
    }

    /// Pending requests sent by `user_id`, newest first.
    pub fn outgoing_requests(&self, user_id: i64) -> Result<Vec<RequestWithProfile>, StoreError> {
        self.list_pending(user_id, /* incoming */ false)
    }

    fn list_pending(
        &self,
        user_id: i64,
        incoming: bool,
    ) -> Result<Vec<RequestWithProfile>, StoreError> {
        // Incoming rows join the sender's profile, outgoing rows the receiver's.
        let (filter_col, join_col) = if incoming {
            ("receiver_id", "sender_id")
        } else {
            ("sender_id", "receiver_id")
        };
        let sql = format!(
            "SELECT fr.id, fr.created_at, u.id, u.username, u.profile_photo_url, u.entry_count
             FROM friend_requests fr
             JOIN users u ON u.id = fr.{join_col}
             WHERE fr.{filter_col} = ?1 AND fr.status = 'pending'
             ORDER BY fr.created_at DESC, fr.id DESC"
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(RequestWithProfile {
                        id: row.get(0)?,
                        created_at: parse_ts(&row.get::<_, String>(1)?),
                        user: ProfileRow {
                            id: row.get(2)?,
                            username: row.get(3)?,
                            profile_photo_url: row.get(4)?,
                            entry_count: row.get(5)?,
                        },
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Friendship edges for `user_id` joined with friend profiles, ordered by
    /// the friend's username ascending.
    pub fn list_friends(&self, user_id: i64) -> Result<Vec<FriendRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.friend_id, u.username, u.profile_photo_url, u.entry_count,
                        u.last_login_at, f.created_at
                 FROM friendships f
                 JOIN users u ON u.id = f.friend_id
                 WHERE f.user_id = ?1
                 ORDER BY u.username ASC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRow {
                        friend_id: row.get(0)?,
                        username: row.get(1)?,
                        profile_photo_url: row.get(2)?,
                        entry_count: row.get(3)?,
                        last_login_at: row.get::<_, Option<String>>(4)?.map(|s| parse_ts(&s)),
                        created_at: parse_ts(&row.get::<_, String>(5)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// True when a friendship edge exists in either direction.
    pub fn are_friends(&self, a: i64, b: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| friendship_exists(conn, a, b))
    }
}

fn map_request(row: &Row) -> rusqlite::Result<FriendRequestRow> {
    let status: String = row.get(3)?;
    Ok(FriendRequestRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        status: FriendRequestStatus::parse(&status).unwrap_or(FriendRequestStatus::Pending),
        created_at: parse_ts(&row.get::<_, String>(4)?),
    })
}

fn friendship_exists(conn: &Connection, a: i64, b: i64) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM friendships
             WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
            params![a, b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Core of the accept operation, shared by the explicit accept and the
/// auto-accept branch of send: request goes terminal, both directed edges are
/// inserted, both follower counters move — all or nothing.
fn accept_pending(
    conn: &Connection,
    request_id: i64,
    accepting_user_id: i64,
) -> Result<AcceptedFriendship, StoreError> {
    let request: Option<(i64, i64)> = conn
        .query_row(
            "SELECT sender_id, receiver_id FROM friend_requests
             WHERE id = ?1 AND receiver_id = ?2 AND status = 'pending'",
            params![request_id, accepting_user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((sender_id, receiver_id)) = request else {
        return Err(StoreError::RequestNotFound);
    };

    conn.execute(
        "UPDATE friend_requests SET status = 'accepted' WHERE id = ?1",
        [request_id],
    )?;

    let ts = now_ts();
    for (user_id, friend_id) in [(sender_id, receiver_id), (receiver_id, sender_id)] {
        conn.execute(
            "INSERT INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, friend_id, ts],
        )
        .map_err(|e| {
            // A racing accept already materialized the edge; roll back.
            if is_constraint_violation(&e) {
                StoreError::AlreadyFriends
            } else {
                StoreError::from(e)
            }
        })?;
    }

    conn.execute(
        "UPDATE users SET follower_count = follower_count + 1 WHERE id IN (?1, ?2)",
        params![sender_id, receiver_id],
    )?;

    Ok(AcceptedFriendship {
        request_id,
        sender_id,
        receiver_id,
    })
}
