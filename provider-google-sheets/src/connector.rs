//! Google Sheets API connector implementation
//!
//! Implements the `SheetSource` trait for Google Sheets API v4.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::sheets::{SheetSource, SheetSummary, SheetValues};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleSheetsError;
use crate::types::{ErrorEnvelope, SpreadsheetResponse, ValueRange};

/// Google Sheets API base URL
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Field mask for sheet listing
const SHEET_FIELDS: &str =
    "sheets.properties(sheetId,title,index,hidden,gridProperties(rowCount,columnCount))";

/// Google Sheets API connector
///
/// # Features
///
/// - Sheet listing with grid dimensions
/// - Header and bounded row reads (`FORMATTED_VALUE` rendering)
/// - Exponential backoff for 429 and 5xx responses
/// - OAuth 2.0 bearer authentication via `HttpClient`
///
/// # Example
///
/// ```ignore
/// use provider_google_sheets::GoogleSheetsConnector;
/// use bridge_traits::sheets::SheetSource;
///
/// let connector = GoogleSheetsConnector::new(http_client, access_token);
/// let sheets = connector.list_sheets("1AbC...").await?;
/// ```
pub struct GoogleSheetsConnector {
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token with `spreadsheets.readonly` scope
    access_token: String,

    retry_policy: RetryPolicy,

    request_timeout: Duration,
}

impl GoogleSheetsConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            retry_policy: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// A1 range covering the header plus `max_rows` data rows, or the whole sheet.
    fn a1_range(sheet_name: &str, max_rows: Option<usize>) -> String {
        let quoted = format!("'{}'", sheet_name.replace('\'', "''"));
        match max_rows {
            Some(rows) => format!("{}!1:{}", quoted, rows + 1),
            None => quoted,
        }
    }

    fn cell_text(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let policy = &self.retry_policy;
        let delay = if policy.use_exponential_backoff {
            policy.base_delay.saturating_mul(2u32.saturating_pow(attempt))
        } else {
            policy.base_delay
        };
        delay.min(policy.max_delay)
    }

    /// Classify a non-2xx response.
    fn classify(response: &HttpResponse) -> GoogleSheetsError {
        let (message, status_name) = match response.json::<ErrorEnvelope>() {
            Ok(envelope) => (envelope.error.message, envelope.error.status),
            Err(_) => (String::from_utf8_lossy(&response.body).to_string(), String::new()),
        };

        if response.status == 429
            || status_name == "RESOURCE_EXHAUSTED"
            || message.to_lowercase().contains("quota")
        {
            return GoogleSheetsError::QuotaExceeded(message);
        }

        match response.status {
            401 => GoogleSheetsError::AuthenticationFailed(message),
            403 => GoogleSheetsError::PermissionDenied(message),
            404 => GoogleSheetsError::NotFound(message),
            400 if message.contains("Unable to parse range") => {
                GoogleSheetsError::NotFound(message)
            }
            status_code => GoogleSheetsError::ApiError {
                status_code,
                message,
            },
        }
    }

    /// Execute a GET with retry logic
    ///
    /// Implements exponential backoff for rate limiting and transient errors.
    #[instrument(skip(self), fields(url = %url))]
    async fn get_with_retry(&self, url: String) -> Result<HttpResponse> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let request = HttpRequest::get(url.clone())
                .bearer_token(self.access_token.as_str())
                .header("Accept", "application/json")
                .timeout(self.request_timeout);

            match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, "API request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.status == 429 || response.is_server_error() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(
                            status = response.status,
                            attempts = attempt,
                            "API request failed after retries"
                        );
                        return Err(Self::classify(&response).into());
                    }

                    let backoff = self.backoff(attempt);
                    warn!(
                        status = response.status,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "API request failed, retrying"
                    );
                    core_async::time::sleep(backoff).await;
                }
                Ok(response) => {
                    // Client error, not retried
                    warn!(status = response.status, "API request rejected");
                    return Err(Self::classify(&response).into());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(error = %e, attempts = attempt, "API request failed after retries");
                        return Err(e);
                    }

                    let backoff = self.backoff(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        "API request failed, retrying"
                    );
                    core_async::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsConnector {
    #[instrument(skip(self))]
    async fn list_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetSummary>> {
        info!("Listing sheets from Google Sheets");

        let url = format!(
            "{}/{}?fields={}",
            SHEETS_API_BASE,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(SHEET_FIELDS)
        );

        let response = self.get_with_retry(url).await?;
        let spreadsheet: SpreadsheetResponse = serde_json::from_slice(&response.body)
            .map_err(|e| GoogleSheetsError::ParseError(e.to_string()))?;

        let mut sheets: Vec<_> = spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .collect();
        sheets.sort_by_key(|p| p.index);

        let summaries: Vec<SheetSummary> = sheets
            .into_iter()
            .map(|p| {
                let grid = p.grid_properties.unwrap_or_default();
                SheetSummary {
                    title: p.title,
                    row_count: grid.row_count.saturating_sub(1),
                    column_count: grid.column_count,
                    hidden: p.hidden,
                }
            })
            .collect();

        info!("Retrieved {} sheets", summaries.len());
        Ok(summaries)
    }

    #[instrument(skip(self))]
    async fn read_values(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        max_rows: Option<usize>,
    ) -> Result<SheetValues> {
        let range = Self::a1_range(sheet_name, max_rows);
        let url = format!(
            "{}/{}/values/{}?majorDimension=ROWS&valueRenderOption=FORMATTED_VALUE",
            SHEETS_API_BASE,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(&range)
        );

        let response = self.get_with_retry(url).await?;
        let value_range: ValueRange = serde_json::from_slice(&response.body)
            .map_err(|e| GoogleSheetsError::ParseError(e.to_string()))?;

        let mut rows = value_range
            .values
            .iter()
            .map(|row| row.iter().map(Self::cell_text).collect::<Vec<_>>());

        let header: Vec<String> = rows
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        // Interior blank rows come back as empty arrays
        let data: Vec<Vec<String>> = rows
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();

        debug!(
            columns = header.len(),
            rows = data.len(),
            "Read sheet values"
        );

        Ok(SheetValues { header, rows: data })
    }
}
