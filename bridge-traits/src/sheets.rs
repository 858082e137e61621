//! Spreadsheet source abstraction.
//!
//! The sync engine reads rows from an external spreadsheet service. The
//! service is an external collaborator; this trait is the only contract the
//! core relies on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One tab of a spreadsheet as reported by the source, before any cells
/// are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub title: String,
    /// Data rows, excluding the header row, as reported by the sheet grid.
    pub row_count: u64,
    pub column_count: u64,
    pub hidden: bool,
}

/// Cell values of a sheet: the header row and the data rows beneath it.
///
/// Cells are the formatted strings the source displays. Rows may be shorter
/// than the header when trailing cells are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetValues {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetValues {
    /// Position of `column` in the header, compared after trimming.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        let wanted = column.trim();
        self.header.iter().position(|h| h.trim() == wanted)
    }
}

/// Read access to an external spreadsheet.
///
/// Implementations classify failures into
/// [`BridgeError::PermissionDenied`](crate::BridgeError::PermissionDenied),
/// [`BridgeError::NotFound`](crate::BridgeError::NotFound),
/// [`BridgeError::QuotaExceeded`](crate::BridgeError::QuotaExceeded) and
/// [`BridgeError::Network`](crate::BridgeError::Network) so callers can
/// present distinct messages.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// List every tab of the spreadsheet.
    async fn list_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetSummary>>;

    /// Read the header row and up to `max_rows` data rows (all rows when `None`).
    async fn read_values(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        max_rows: Option<usize>,
    ) -> Result<SheetValues>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_ignores_surrounding_whitespace() {
        let values = SheetValues {
            header: vec!["Name".into(), " Tour Date ".into()],
            rows: vec![],
        };

        assert_eq!(values.column_index("Tour Date"), Some(1));
        assert_eq!(values.column_index("Price"), None);
    }
}
