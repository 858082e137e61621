//! # Sync Service
//!
//! Transport-agnostic handlers for the `/sync/...` endpoints. Each handler
//! takes the decoded request and returns a [`Reply`] carrying the HTTP status
//! and the JSON body; the host's HTTP layer only moves bytes.
//!
//! | Endpoint | Handler |
//! |----------|---------|
//! | `POST /sync/sheets` | [`SyncService::sheets`] |
//! | `POST /sync/sheet-columns` | [`SyncService::sheet_columns`] |
//! | `GET /sync/all-tables` | [`SyncService::all_tables`] |
//! | `GET /sync/schema?table=` | [`SyncService::schema`] |
//! | `GET /sync/history?table=&spreadsheetId=` | [`SyncService::history`] |
//! | `POST /sync/optimized` | [`SyncService::optimized`] |
//! | `POST /sync/flexible/stream` | [`SyncService::stream`] |
//! | `GET /sync/reservation-cleanup` | [`SyncService::reservation_cleanup`] |
//!
//! The two sync endpoints require `Authorization: Bearer <token>`.

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::CoreDependencies;
use bridge_traits::error::BridgeError;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_async::sync::CancellationToken;
use core_sync::api::{
    ApiResponse, CleanupStatus, HistoryData, SchemaData, SchemaSource, SheetColumnsData,
    SheetColumnsRequest, SheetInfo, SheetsData, SheetsRequest, SyncRequest, TableInfo, TablesData,
};
use core_sync::{
    encode_event, get_fallback_columns, SyncEventStream, SyncOrchestrator, SyncResult,
    NDJSON_CONTENT_TYPE,
};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{error, info, instrument, warn};

/// Status plus body, ready for the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<B> {
    pub status: u16,
    pub body: B,
}

pub type ApiReply<T> = Reply<ApiResponse<T>>;

impl<B: Serialize> Reply<B> {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.body)
    }
}

impl<T> Reply<ApiResponse<T>> {
    fn ok(data: T) -> Self {
        Reply {
            status: 200,
            body: ApiResponse::ok(data),
        }
    }

    fn failed(error: &ServiceError) -> Self {
        Reply {
            status: error.status_code(),
            body: ApiResponse::error(error.to_string()),
        }
    }

    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                warn!(status = e.status_code(), error = %e, "Request failed");
                Self::failed(&e)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.body.success
    }
}

/// Body of an accepted streaming request: one NDJSON line per event.
///
/// Dropping it stops the run before its next row.
pub struct NdjsonStream {
    events: SyncEventStream,
}

impl NdjsonStream {
    pub fn content_type(&self) -> &'static str {
        NDJSON_CONTENT_TYPE
    }
}

impl Stream for NdjsonStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        loop {
            match Pin::new(&mut self.events).poll_next(cx) {
                Poll::Ready(Some(event)) => match encode_event(&event) {
                    Ok(line) => return Poll::Ready(Some(line)),
                    Err(e) => error!(error = %e, kind = event.kind(), "Dropping unencodable event"),
                },
                other => return other.map(|_| None),
            }
        }
    }
}

/// Outcome of `POST /sync/flexible/stream`.
pub enum StreamReply {
    Accepted(NdjsonStream),
    Rejected(ApiReply<()>),
}

impl StreamReply {
    pub fn status(&self) -> u16 {
        match self {
            StreamReply::Accepted(_) => 200,
            StreamReply::Rejected(reply) => reply.status,
        }
    }
}

/// Optional collaborator behind `GET /sync/reservation-cleanup`.
#[async_trait::async_trait]
pub trait CleanupStatusProvider: Send + Sync {
    async fn cleanup_status(&self) -> bridge_traits::error::Result<serde_json::Value>;
}

#[derive(Clone)]
pub struct SyncService {
    deps: Arc<CoreDependencies>,
    config: Arc<ServiceConfig>,
    orchestrator: SyncOrchestrator,
}

impl SyncService {
    pub fn new(deps: CoreDependencies, config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let orchestrator = SyncOrchestrator::new(
            deps.sheet_source.clone(),
            deps.table_store.clone(),
            config.sync.clone(),
        )
        .with_history(deps.run_history.clone());

        Ok(Self {
            deps: Arc::new(deps),
            config: Arc::new(config),
            orchestrator,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Check an `Authorization` header value.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<()> {
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ServiceError::Unauthorized)?;

        if self.config.api_tokens.iter().any(|t| t == token) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized)
        }
    }

    fn ensure_allowed(&self, table: &str) -> Result<()> {
        if self.config.is_table_allowed(table) {
            Ok(())
        } else {
            Err(ServiceError::TableNotAllowed(table.to_string()))
        }
    }

    fn ensure_sync_request(&self, request: &SyncRequest) -> Result<()> {
        request.validate().map_err(ServiceError::BadRequest)?;
        self.ensure_allowed(&request.target_table)
    }

    /// `POST /sync/sheets`: visible tabs with their row counts.
    #[instrument(skip(self, request), fields(spreadsheet_id = %request.spreadsheet_id))]
    pub async fn sheets(&self, request: SheetsRequest) -> ApiReply<SheetsData> {
        Reply::from_result(self.list_sheets(&request.spreadsheet_id).await)
    }

    async fn list_sheets(&self, spreadsheet_id: &str) -> Result<SheetsData> {
        if spreadsheet_id.trim().is_empty() {
            return Err(ServiceError::BadRequest("spreadsheetId is required".to_string()));
        }
        let summaries = self
            .deps
            .sheet_source
            .list_sheets(spreadsheet_id)
            .await
            .map_err(ServiceError::Source)?;

        let sheets = summaries
            .into_iter()
            .filter(|s| !s.hidden)
            .map(|s| SheetInfo {
                name: s.title,
                row_count: s.row_count,
                ..SheetInfo::default()
            })
            .collect();
        Ok(SheetsData { sheets })
    }

    /// `POST /sync/sheet-columns`: header plus a few sample rows.
    #[instrument(skip(self, request), fields(sheet = %request.sheet_name))]
    pub async fn sheet_columns(&self, request: SheetColumnsRequest) -> ApiReply<SheetColumnsData> {
        Reply::from_result(self.load_sheet_columns(&request).await)
    }

    async fn load_sheet_columns(&self, request: &SheetColumnsRequest) -> Result<SheetColumnsData> {
        if request.spreadsheet_id.trim().is_empty() || request.sheet_name.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "spreadsheetId and sheetName are required".to_string(),
            ));
        }
        let values = self
            .deps
            .sheet_source
            .read_values(
                &request.spreadsheet_id,
                &request.sheet_name,
                Some(self.config.sync.sample_rows),
            )
            .await
            .map_err(ServiceError::Source)?;

        Ok(SheetColumnsData {
            columns: values.header,
            sample_data: values.rows,
        })
    }

    /// `GET /sync/all-tables`: allow-listed tables that exist in the store.
    pub async fn all_tables(&self) -> ApiReply<TablesData> {
        let result = self
            .deps
            .table_store
            .list_tables()
            .await
            .map_err(ServiceError::Store)
            .map(|tables| TablesData {
                tables: tables
                    .into_iter()
                    .filter(|t| self.config.is_table_allowed(t))
                    .map(|name| TableInfo { name })
                    .collect(),
            });
        Reply::from_result(result)
    }

    /// `GET /sync/schema?table=`
    ///
    /// Introspection failures other than an unknown table degrade to the
    /// static column list with `source: "fallback"`.
    #[instrument(skip(self))]
    pub async fn schema(&self, table: Option<&str>) -> ApiReply<SchemaData> {
        Reply::from_result(self.table_schema(table).await)
    }

    async fn table_schema(&self, table: Option<&str>) -> Result<SchemaData> {
        let table = table
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ServiceError::BadRequest("table is required".to_string()))?;
        self.ensure_allowed(table)?;

        match self.deps.table_store.table_columns(table).await {
            Ok(columns) => Ok(SchemaData {
                columns,
                source: SchemaSource::Database,
            }),
            Err(e @ BridgeError::NotFound(_)) => Err(ServiceError::Store(e)),
            Err(e) => {
                warn!(table, error = %e, "Schema introspection failed, serving fallback columns");
                Ok(SchemaData {
                    columns: get_fallback_columns(table),
                    source: SchemaSource::Fallback,
                })
            }
        }
    }

    /// `GET /sync/history?table=&spreadsheetId=`
    pub async fn history(
        &self,
        table: Option<&str>,
        spreadsheet_id: Option<&str>,
    ) -> ApiReply<HistoryData> {
        Reply::from_result(self.last_sync(table, spreadsheet_id).await)
    }

    async fn last_sync(
        &self,
        table: Option<&str>,
        spreadsheet_id: Option<&str>,
    ) -> Result<HistoryData> {
        let (Some(table), Some(spreadsheet_id)) = (table, spreadsheet_id) else {
            return Err(ServiceError::BadRequest(
                "table and spreadsheetId are required".to_string(),
            ));
        };
        self.ensure_allowed(table)?;

        let last = self
            .deps
            .run_history
            .last_sync_time(table, spreadsheet_id)
            .await?;
        Ok(HistoryData {
            last_sync_time: last.and_then(millis_to_datetime),
        })
    }

    /// `POST /sync/optimized`: one round trip, bare [`SyncResult`] body.
    #[instrument(skip(self, authorization, request), fields(table = %request.target_table))]
    pub async fn optimized(
        &self,
        authorization: Option<&str>,
        request: SyncRequest,
    ) -> Reply<SyncResult> {
        if let Err(e) = self
            .authorize(authorization)
            .and_then(|_| self.ensure_sync_request(&request))
        {
            warn!(status = e.status_code(), error = %e, "Optimized sync rejected");
            return Reply {
                status: e.status_code(),
                body: SyncResult::failure(e.to_string()),
            };
        }

        let mut result = self.orchestrator.run_optimized(request).await;
        result.sync_time = Some(Utc::now());
        info!(success = result.success, count = ?result.count, "Optimized sync finished");
        Reply {
            status: 200,
            body: result,
        }
    }

    /// `POST /sync/flexible/stream`
    ///
    /// `cancel` is the connection's lifetime token; firing it, or dropping
    /// the returned stream, stops the run before its next row.
    #[instrument(skip(self, authorization, request, cancel), fields(table = %request.target_table))]
    pub fn stream(
        &self,
        authorization: Option<&str>,
        request: SyncRequest,
        cancel: CancellationToken,
    ) -> StreamReply {
        if let Err(e) = self
            .authorize(authorization)
            .and_then(|_| self.ensure_sync_request(&request))
        {
            warn!(status = e.status_code(), error = %e, "Streaming sync rejected");
            return StreamReply::Rejected(Reply::failed(&e));
        }

        info!(
            truncate = request.truncate_table,
            incremental = request.enable_incremental_sync,
            "Streaming sync accepted"
        );
        StreamReply::Accepted(NdjsonStream {
            events: self.orchestrator.run_streaming(request, cancel),
        })
    }

    /// `GET /sync/reservation-cleanup`
    pub async fn reservation_cleanup(&self) -> ApiReply<CleanupStatus> {
        let result = match &self.deps.cleanup {
            Some(provider) => provider
                .cleanup_status()
                .await
                .map(CleanupStatus)
                .map_err(ServiceError::Store),
            None => Err(ServiceError::Store(BridgeError::NotAvailable(
                "reservation cleanup status".to_string(),
            ))),
        };
        Reply::from_result(result)
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
