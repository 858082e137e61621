//! Error types for Google Sheets provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Sheets provider errors
#[derive(Error, Debug)]
pub enum GoogleSheetsError {
    /// Token missing, expired or revoked (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The caller cannot read the spreadsheet (403)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Spreadsheet or sheet does not exist (404, or an unparsable range)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Read quota exhausted (429 or `RESOURCE_EXHAUSTED`)
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-2xx status
    #[error("Google Sheets API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Sheets operations
pub type Result<T> = std::result::Result<T, GoogleSheetsError>;

impl From<GoogleSheetsError> for BridgeError {
    fn from(error: GoogleSheetsError) -> Self {
        match error {
            GoogleSheetsError::AuthenticationFailed(msg) => {
                BridgeError::PermissionDenied(format!("Authentication failed: {}", msg))
            }
            GoogleSheetsError::PermissionDenied(msg) => BridgeError::PermissionDenied(msg),
            GoogleSheetsError::NotFound(msg) => BridgeError::NotFound(msg),
            GoogleSheetsError::QuotaExceeded(msg) => BridgeError::QuotaExceeded(msg),
            GoogleSheetsError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            GoogleSheetsError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleSheetsError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleSheetsError::ApiError {
            status_code: 400,
            message: "Invalid range".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Sheets API error (status 400): Invalid range"
        );
    }

    #[test]
    fn test_error_conversion_keeps_class() {
        let quota: BridgeError = GoogleSheetsError::QuotaExceeded("reads".into()).into();
        assert!(matches!(quota, BridgeError::QuotaExceeded(_)));

        let denied: BridgeError = GoogleSheetsError::PermissionDenied("x".into()).into();
        assert!(matches!(denied, BridgeError::PermissionDenied(_)));

        let missing: BridgeError = GoogleSheetsError::NotFound("x".into()).into();
        assert!(matches!(missing, BridgeError::NotFound(_)));

        let auth: BridgeError = GoogleSheetsError::AuthenticationFailed("x".into()).into();
        assert!(matches!(auth, BridgeError::PermissionDenied(_)));
    }

    #[test]
    fn test_bridge_error_passes_through() {
        let error = GoogleSheetsError::from(BridgeError::Network("reset".into()));
        let bridge: BridgeError = error.into();
        assert!(matches!(bridge, BridgeError::Network(_)));
    }
}
