use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("Table '{0}' is not available for sync")]
    TableNotAllowed(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Sheet source error: {0}")]
    Source(BridgeError),

    #[error("Destination store error: {0}")]
    Store(BridgeError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),
}

impl ServiceError {
    /// HTTP status a reply for this error carries.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Unauthorized => 401,
            ServiceError::TableNotAllowed(_) => 403,
            ServiceError::BadRequest(_) => 400,
            ServiceError::Source(e) | ServiceError::Store(e) => e.status_code(),
            ServiceError::InitializationFailed(_)
            | ServiceError::CapabilityMissing { .. }
            | ServiceError::Sync(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
