use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Table is not available for sync: {0}")]
    UnknownTable(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Primary SQLite result codes that mean the database itself is unusable:
/// BUSY, LOCKED, READONLY, IOERR, CORRUPT, FULL, CANTOPEN, NOTADB.
const UNUSABLE_SQLITE_CODES: &[i64] = &[5, 6, 8, 10, 11, 13, 14, 26];

impl StoreError {
    /// Driver message without the sqlx prefix, suitable for per-row logs.
    pub fn row_message(&self) -> String {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => db.message().to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the failure belongs to one statement (constraint, type,
    /// bad identifier) rather than to the store as a whole.
    pub fn is_row_level(&self) -> bool {
        match self {
            StoreError::InvalidIdentifier(_) => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                !is_unusable_code(db.code().as_deref()) && !is_missing_table(db.message())
            }
            StoreError::Database(
                sqlx::Error::Encode(_) | sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. },
            ) => true,
            _ => false,
        }
    }
}

fn is_unusable_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i64>().ok())
        .is_some_and(|c| UNUSABLE_SQLITE_CODES.contains(&(c & 0xff)))
}

fn is_missing_table(message: &str) -> bool {
    message.starts_with("no such table")
}

impl From<StoreError> for BridgeError {
    fn from(error: StoreError) -> Self {
        if error.is_row_level() {
            return match error {
                StoreError::InvalidIdentifier(_) => BridgeError::OperationFailed(error.to_string()),
                other => BridgeError::DatabaseError(other.row_message()),
            };
        }
        match error {
            StoreError::UnknownTable(table) => BridgeError::NotFound(format!("table {}", table)),
            StoreError::Database(sqlx::Error::Database(db)) if is_missing_table(db.message()) => {
                BridgeError::NotFound(db.message().to_string())
            }
            StoreError::Database(sqlx::Error::Io(io)) => BridgeError::Io(io),
            other => BridgeError::NotAvailable(other.row_message()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
