use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP status a server surface should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::PermissionDenied(_) => 403,
            BridgeError::NotFound(_) => 404,
            BridgeError::QuotaExceeded(_) => 429,
            BridgeError::Timeout(_) => 504,
            BridgeError::Network(_) => 502,
            BridgeError::NotAvailable(_) => 503,
            BridgeError::Cancelled
            | BridgeError::OperationFailed(_)
            | BridgeError::DatabaseError(_)
            | BridgeError::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_distinct_per_class() {
        assert_eq!(BridgeError::PermissionDenied("x".into()).status_code(), 403);
        assert_eq!(BridgeError::NotFound("x".into()).status_code(), 404);
        assert_eq!(BridgeError::QuotaExceeded("x".into()).status_code(), 429);
        assert_eq!(BridgeError::DatabaseError("x".into()).status_code(), 500);
    }
}
