//! HTTP client for the `/sync/...` endpoints.
//!
//! Every call goes through the injected [`HttpClient`]. Non-success statuses
//! and `{ success: false }` envelopes become [`ClientError`]s with the class
//! the status implies, so callers can pick the right user-facing text.

use crate::error::{ClientError, Result};
use bridge_traits::http::{ByteStream, HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::CoreConfig;
use core_sync::api::{
    ApiResponse, CleanupStatus, HistoryData, SchemaData, SheetColumnsData, SheetColumnsRequest,
    SheetsData, SheetsRequest, SyncRequest, TablesData,
};
use core_sync::{SyncResult, NDJSON_CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct SyncApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    bearer_token: Option<String>,
    request_timeout: Duration,
}

impl fmt::Debug for SyncApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncApiClient")
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SyncApiClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        let mut client = Self::new(config.http_client.clone(), config.api_base_url.clone())
            .with_request_timeout(config.timeouts.request);
        client.bearer_token = config.bearer_token.clone();
        client
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        match &self.bearer_token {
            Some(token) => request.bearer_token(token.as_str()),
            None => request,
        }
    }

    /// `POST /sync/sheets`
    #[instrument(skip(self))]
    pub async fn list_sheets(&self, spreadsheet_id: &str, timeout: Duration) -> Result<SheetsData> {
        let request = HttpRequest::post(self.url("/sync/sheets"))
            .json(&SheetsRequest {
                spreadsheet_id: spreadsheet_id.to_string(),
            })?
            .timeout(timeout);
        self.send(request).await
    }

    /// `POST /sync/sheet-columns`
    #[instrument(skip(self))]
    pub async fn sheet_columns(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<SheetColumnsData> {
        let request = HttpRequest::post(self.url("/sync/sheet-columns"))
            .json(&SheetColumnsRequest {
                spreadsheet_id: spreadsheet_id.to_string(),
                sheet_name: sheet_name.to_string(),
            })?
            .timeout(self.request_timeout);
        self.send(request).await
    }

    /// `GET /sync/all-tables`
    pub async fn all_tables(&self) -> Result<TablesData> {
        let request = HttpRequest::get(self.url("/sync/all-tables")).timeout(self.request_timeout);
        self.send(request).await
    }

    /// `GET /sync/schema?table=`
    #[instrument(skip(self))]
    pub async fn table_schema(&self, table: &str, timeout: Duration) -> Result<SchemaData> {
        let url = format!(
            "{}?table={}",
            self.url("/sync/schema"),
            urlencoding::encode(table)
        );
        self.send(HttpRequest::get(url).timeout(timeout)).await
    }

    /// `GET /sync/history?table=&spreadsheetId=`
    pub async fn sync_history(&self, table: &str, spreadsheet_id: &str) -> Result<HistoryData> {
        let url = format!(
            "{}?table={}&spreadsheetId={}",
            self.url("/sync/history"),
            urlencoding::encode(table),
            urlencoding::encode(spreadsheet_id)
        );
        self.send(HttpRequest::get(url).timeout(self.request_timeout))
            .await
    }

    /// `GET /sync/reservation-cleanup`
    pub async fn reservation_cleanup(&self) -> Result<CleanupStatus> {
        let request =
            HttpRequest::get(self.url("/sync/reservation-cleanup")).timeout(self.request_timeout);
        self.send(request).await
    }

    /// `POST /sync/optimized`
    ///
    /// The reply is a bare [`SyncResult`]; a `success: false` body is returned
    /// as-is, not as an error.
    #[instrument(skip(self, body), fields(table = %body.target_table))]
    pub async fn sync_optimized(&self, body: &SyncRequest) -> Result<SyncResult> {
        let request = self.authorized(HttpRequest::post(self.url("/sync/optimized")).json(body)?);
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }
        response
            .json::<SyncResult>()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// `POST /sync/flexible/stream`
    ///
    /// Returns the raw NDJSON body. No overall deadline is applied; dropping
    /// the stream aborts the transfer.
    #[instrument(skip(self, body), fields(table = %body.target_table))]
    pub async fn open_sync_stream(&self, body: &SyncRequest) -> Result<ByteStream> {
        let request = self.authorized(
            HttpRequest::post(self.url("/sync/flexible/stream"))
                .header("Accept", NDJSON_CONTENT_TYPE)
                .json(body)?,
        );
        let response = self.http.execute_stream(request).await?;
        if !response.is_success() {
            let status = response.status;
            let buffered = response.collect().await?;
            debug!(status, "Sync stream rejected");
            return Err(status_error(&buffered));
        }
        Ok(response.body)
    }

    async fn send<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.http.execute(self.authorized(request)).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: response.status,
                message: envelope.message.unwrap_or_default(),
            });
        }
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("response has no data".to_string()))
    }
}

/// Error for a non-success response, using the envelope message when present.
fn status_error(response: &HttpResponse) -> ClientError {
    let message = response
        .json::<ApiResponse<serde_json::Value>>()
        .ok()
        .and_then(|envelope| envelope.message)
        .or_else(|| response.text().ok())
        .unwrap_or_default();
    ClientError::from_status(response.status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpMethod;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[core_async::test]
    async fn test_list_sheets_posts_spreadsheet_id() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|r| {
                r.method == HttpMethod::Post
                    && r.url == "https://api.example.com/sync/sheets"
                    && r.timeout == Some(Duration::from_secs(60))
                    && r.body
                        .as_ref()
                        .is_some_and(|b| b.as_ref() == br#"{"spreadsheetId":"abc"}"#)
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"success":true,"data":{"sheets":[{"name":"S_예약","rowCount":3}]}}"#,
                ))
            });

        let client = SyncApiClient::new(Arc::new(http), "https://api.example.com/");
        let data = client
            .list_sheets("abc", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(data.sheets[0].name, "S_예약");
        assert_eq!(data.sheets[0].row_count, 3);
    }

    #[core_async::test]
    async fn test_schema_query_is_url_encoded() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|r| r.url == "https://api.example.com/sync/schema?table=product%20options")
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"success":true,"data":{"columns":[{"name":"id","type":"INTEGER"}],"source":"database"}}"#,
                ))
            });

        let client = SyncApiClient::new(Arc::new(http), "https://api.example.com");
        let schema = client
            .table_schema("product options", Duration::from_secs(15))
            .await
            .unwrap();
        assert_eq!(schema.columns.len(), 1);
    }

    #[core_async::test]
    async fn test_error_statuses_map_to_classes() {
        let mut http = MockHttp::new();
        http.expect_execute().returning(|_| {
            Ok(response(
                403,
                r#"{"success":false,"message":"The caller does not have permission"}"#,
            ))
        });

        let client = SyncApiClient::new(Arc::new(http), "https://api.example.com");
        let err = client
            .list_sheets("abc", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::PermissionDenied("The caller does not have permission".to_string())
        );
    }

    #[core_async::test]
    async fn test_unsuccessful_envelope_is_api_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(response(200, r#"{"success":false,"message":"nope"}"#)));

        let client = SyncApiClient::new(Arc::new(http), "https://api.example.com");
        let err = client.all_tables().await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Api {
                status: 200,
                message: "nope".to_string()
            }
        );
    }

    #[core_async::test]
    async fn test_sync_requests_carry_bearer_token() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|r| r.headers.get("Authorization").map(String::as_str) == Some("Bearer t0k"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"success":true,"message":"done","count":3}"#,
                ))
            });

        let client =
            SyncApiClient::new(Arc::new(http), "https://api.example.com").with_bearer_token("t0k");
        let body = SyncRequest::new("sid", "S_예약", "reservations", Default::default());
        let result = client.sync_optimized(&body).await.unwrap();
        assert!(result.success);
        assert_eq!(result.count, Some(3));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = SyncApiClient::new(Arc::new(MockHttp::new()), "https://api.example.com")
            .with_bearer_token("secret-token");
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("secret-token"));
    }
}
