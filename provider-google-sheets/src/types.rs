//! Google Sheets API response types
//!
//! Data structures for deserializing Google Sheets API v4 responses.

use serde::{Deserialize, Serialize};

/// `spreadsheets.get` response, restricted by a `fields` mask to sheet properties.
///
/// See: https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets/get
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetResponse {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,

    pub title: String,

    #[serde(default)]
    pub index: i64,

    /// Absent unless the sheet is hidden
    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub grid_properties: Option<GridProperties>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(default)]
    pub row_count: u64,

    #[serde(default)]
    pub column_count: u64,
}

/// `spreadsheets.values.get` response
///
/// See: https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets.values/get
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,

    #[serde(default)]
    pub major_dimension: Option<String>,

    /// Omitted entirely when the range is empty
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    /// Canonical status such as `PERMISSION_DENIED` or `RESOURCE_EXHAUSTED`
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_response_parses_properties() {
        let json = r#"{
            "sheets": [
                {"properties": {"sheetId": 0, "title": "S_0501", "index": 0,
                    "gridProperties": {"rowCount": 120, "columnCount": 9}}},
                {"properties": {"sheetId": 7, "title": "memo", "index": 1, "hidden": true}}
            ]
        }"#;

        let response: SpreadsheetResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.sheets.len(), 2);
        assert_eq!(response.sheets[0].properties.title, "S_0501");
        assert_eq!(
            response.sheets[0]
                .properties
                .grid_properties
                .map(|g| g.row_count),
            Some(120)
        );
        assert!(response.sheets[1].properties.hidden);
        assert!(response.sheets[1].properties.grid_properties.is_none());
    }

    #[test]
    fn test_value_range_without_values() {
        let response: ValueRange =
            serde_json::from_str(r#"{"range": "'S_0501'!A1:Z1", "majorDimension": "ROWS"}"#)
                .unwrap();
        assert!(response.values.is_empty());
    }

    #[test]
    fn test_error_envelope() {
        let json = r#"{"error": {"code": 429, "message": "Quota exceeded for quota metric 'Read requests'", "status": "RESOURCE_EXHAUSTED"}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.error.code, 429);
        assert_eq!(envelope.error.status, "RESOURCE_EXHAUSTED");
    }
}
