//! Error types for the escalation record store.

/// Errors that can occur while reading or writing escalation records.
#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    /// A database operation failed.
    #[error("escalation database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be checked out.
    #[error("escalation store connection error: {0}")]
    Connection(#[from] r2d2::Error),

    /// The schema could not be brought up to date.
    #[error("escalation store migration failed: {0}")]
    Migration(#[from] handoff_db::MigrationError),

    /// A stored row could not be turned back into a record.
    #[error("corrupt escalation record for room '{room_id}': {reason}")]
    Corrupt { room_id: String, reason: String },

    /// A bounded write did not commit in time and was rolled back.
    #[error("store write timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The blocking task running the database call failed.
    #[error("escalation store task failed: {0}")]
    Task(String),

    /// Failure reported by a non-SQLite backend, passed through verbatim.
    #[error("{0}")]
    Backend(String),
}
