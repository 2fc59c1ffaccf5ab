use thiserror::Error;

/// Errors surfaced by a [`ChatGateway`](crate::gateway::ChatGateway) implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The platform rejected or failed the request.
    #[error("platform error: {0}")]
    Platform(String),

    #[error("not found: {what}")]
    NotFound { what: String },

    /// An identifier could not be parsed into the platform's id type.
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("request timeout after {ms}ms")]
    Timeout { ms: u64 },
}

/// Why a single thread was skipped during a run.
#[derive(Debug, Error)]
pub enum RollupError {
    #[error("checkpoint error: {0}")]
    Store(#[from] rollup_store::StoreError),

    #[error("no summary produced")]
    NoSummary,
}
