use thiserror::Error;

/// Store-layer error type. Policy violations get their own variants so the API
/// layer can answer with a meaningful message instead of a raw constraint
/// failure; the unique indexes stay in place as a backstop for races.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("You cannot send a friend request to yourself.")]
    SelfRequest,
    #[error("User not found.")]
    UserNotFound,
    #[error("Friend request not found.")]
    RequestNotFound,
    #[error("This user is already your friend.")]
    AlreadyFriends,
    #[error("You already sent a friend request to this user.")]
    DuplicateRequest,
    #[error("You cannot send a message to yourself.")]
    SelfMessage,
    #[error("You can only message your friends.")]
    NotFriends,
    #[error("Message not found.")]
    MessageNotFound,
    #[error("Notification not found.")]
    NotificationNotFound,
    #[error("Username or email is already in use.")]
    UserExists,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Unique-constraint check used by the write paths that treat a constraint
/// violation as a domain error (two racing sends, racing accepts).
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
