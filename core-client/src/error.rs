use crate::messages;
use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Failures a client operation can end in.
///
/// Each class maps to its own user-facing text through
/// [`ClientError::user_message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Settings store error: {0}")]
    Settings(String),
}

impl ClientError {
    pub fn timeout(operation: impl Into<String>) -> Self {
        ClientError::Timeout {
            operation: operation.into(),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ClientError::Unauthorized(message),
            403 => ClientError::PermissionDenied(message),
            404 => ClientError::NotFound(message),
            429 => ClientError::QuotaExceeded(message),
            502 => ClientError::Network(message),
            503 => ClientError::Unavailable(message),
            408 | 504 => ClientError::Timeout { operation: message },
            _ => ClientError::Api { status, message },
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ClientError::Timeout { .. } => messages::TIMEOUT.to_string(),
            ClientError::Cancelled => messages::CANCELLED.to_string(),
            ClientError::Unauthorized(_) => messages::UNAUTHORIZED.to_string(),
            ClientError::PermissionDenied(_) => messages::PERMISSION_DENIED.to_string(),
            ClientError::NotFound(_) => messages::NOT_FOUND.to_string(),
            ClientError::QuotaExceeded(_) => messages::QUOTA_EXCEEDED.to_string(),
            ClientError::Network(_) => messages::NETWORK.to_string(),
            ClientError::Unavailable(_) => messages::UNAVAILABLE.to_string(),
            ClientError::Decode(_) => messages::DECODE.to_string(),
            ClientError::Api { message, .. } | ClientError::Settings(message) => {
                messages::api_failed(message)
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl From<BridgeError> for ClientError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Timeout(operation) => ClientError::Timeout { operation },
            BridgeError::Cancelled => ClientError::Cancelled,
            BridgeError::PermissionDenied(m) => ClientError::PermissionDenied(m),
            BridgeError::NotFound(m) => ClientError::NotFound(m),
            BridgeError::QuotaExceeded(m) => ClientError::QuotaExceeded(m),
            BridgeError::Network(m) => ClientError::Network(m),
            BridgeError::NotAvailable(m) => ClientError::Unavailable(m),
            other => ClientError::Api {
                status: other.status_code(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
