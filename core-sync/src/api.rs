//! Request and response bodies of the `/sync/...` endpoints.
//!
//! Field names are camelCase on the wire. Every response is wrapped in an
//! [`ApiResponse`] envelope.

use crate::event::SyncResult;
use crate::mapping::ColumnMapping;
use bridge_traits::database::ColumnInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One data row of a sheet, cell strings in header order.
pub type SheetRow = Vec<String>;

/// `{ success, data?, message? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One tab of the source spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub name: String,
    /// Filled on first selection.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub sample_data: Vec<SheetRow>,
    #[serde(default)]
    pub row_count: u64,
}

/// A destination table offered for sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsRequest {
    pub spreadsheet_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetsData {
    pub sheets: Vec<SheetInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetColumnsRequest {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetColumnsData {
    pub columns: Vec<String>,
    #[serde(default)]
    pub sample_data: Vec<SheetRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesData {
    pub tables: Vec<TableInfo>,
}

/// Where a column list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSource {
    /// Introspected from the live table.
    Database,
    /// Hand-maintained list used when introspection failed.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaData {
    pub columns: Vec<ColumnInfo>,
    pub source: SchemaSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Body of `POST /sync/flexible/stream` and `POST /sync/optimized`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub target_table: String,
    pub column_mapping: ColumnMapping,
    #[serde(default = "default_incremental")]
    pub enable_incremental_sync: bool,
    #[serde(default)]
    pub truncate_table: bool,
}

fn default_incremental() -> bool {
    true
}

impl SyncRequest {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        target_table: impl Into<String>,
        column_mapping: ColumnMapping,
    ) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            target_table: target_table.into(),
            column_mapping,
            enable_incremental_sync: true,
            truncate_table: false,
        }
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate_table = truncate;
        self
    }

    pub fn incremental(mut self, incremental: bool) -> Self {
        self.enable_incremental_sync = incremental;
        self
    }

    /// Missing identifiers, reported before any I/O.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let missing: Vec<&str> = [
            ("spreadsheetId", &self.spreadsheet_id),
            ("sheetName", &self.sheet_name),
            ("targetTable", &self.target_table),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required fields: {}", missing.join(", ")))
        }
    }
}

/// `POST /sync/optimized` replies with the bare result rather than an envelope.
pub type OptimizedSyncResponse = SyncResult;

/// Opaque reservation-cleanup status, passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleanupStatus(pub serde_json::Value);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_request_defaults() {
        let json = r#"{
            "spreadsheetId": "sid",
            "sheetName": "S_0501",
            "targetTable": "reservations",
            "columnMapping": {"name": "Name"}
        }"#;
        let request: SyncRequest = serde_json::from_str(json).unwrap();

        assert!(request.enable_incremental_sync);
        assert!(!request.truncate_table);
        assert_eq!(request.column_mapping.get("name").map(String::as_str), Some("Name"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_sync_request_validation_lists_fields() {
        let request = SyncRequest::new("", "S_0501", " ", ColumnMapping::new());
        let err = request.validate().unwrap_err();
        assert!(err.contains("spreadsheetId"));
        assert!(err.contains("targetTable"));
        assert!(!err.contains("sheetName"));
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = serde_json::to_value(ApiResponse::ok(TablesData {
            tables: vec![TableInfo {
                name: "reservations".into(),
            }],
        }))
        .unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"]["tables"][0]["name"], "reservations");
        assert!(ok.get("message").is_none());

        let err = serde_json::to_value(ApiResponse::<SheetsData>::error("nope")).unwrap();
        assert_eq!(err["success"], false);
        assert!(err.get("data").is_none());
    }

    #[test]
    fn test_sheet_info_camel_case() {
        let info = SheetInfo {
            name: "S_0501".into(),
            columns: vec![],
            sample_data: vec![],
            row_count: 42,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["rowCount"], 42);
        assert!(json["sampleData"].is_array());
    }

    #[test]
    fn test_schema_source_wire_names() {
        let data = SchemaData {
            columns: vec![ColumnInfo::new("id", "TEXT")],
            source: SchemaSource::Fallback,
        };
        assert_eq!(serde_json::to_value(&data).unwrap()["source"], "fallback");
    }

    #[test]
    fn test_history_null_time() {
        let json = serde_json::to_string(&HistoryData::default()).unwrap();
        assert_eq!(json, r#"{"lastSyncTime":null}"#);
    }

    #[test]
    fn test_cleanup_status_is_transparent() {
        let status: CleanupStatus =
            serde_json::from_str(r#"{"eligible": 3, "lastRun": null}"#).unwrap();
        assert_eq!(status.0["eligible"], 3);
    }
}
