use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync run {run_id} not found")]
    RunNotFound { run_id: String },

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("Invalid run status: {0}")]
    InvalidStatus(String),

    #[error("Invalid sync mode: {0}")]
    InvalidMode(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Sheet source error: {0}")]
    Source(BridgeError),

    #[error("Destination store error: {0}")]
    Store(BridgeError),

    #[error("Malformed event line: {0}")]
    Wire(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for SyncError {
    fn from(error: sqlx::Error) -> Self {
        SyncError::Database(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
