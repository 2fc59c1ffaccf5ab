use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint not found: {thread_id}")]
    NotFound { thread_id: String },

    /// The row's cursor moved since it was read; the write was rejected.
    #[error("stale checkpoint for {thread_id}: expected cursor {expected:?}, found {found:?}")]
    StaleCheckpoint {
        thread_id: String,
        expected: Option<String>,
        found: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
