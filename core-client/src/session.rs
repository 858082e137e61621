//! # Sync Session
//!
//! One operator's working context: the chosen spreadsheet, table and
//! mapping, and at most one sync run at a time.
//!
//! Every network request is bound to a token derived from the session's
//! root token. Requests of the same kind replace each other (last request
//! wins) and [`SyncSession::teardown`] cancels everything still in flight.
//! Every request settles in a terminal state: data, a classified
//! [`ClientError`], or a [`SyncResult`] for sync runs.
//!
//! Progress is published on the session's [`EventBus`] as [`CoreEvent`]s.

use crate::api::SyncApiClient;
use crate::error::{ClientError, Result};
use crate::eta::{self, EtaEstimator};
use crate::mapping_store::MappingStore;
use crate::schema::{SchemaInspector, TableSchema};
use crate::sheet_reader::{SheetListing, SheetReader};
use crate::slot::RequestSlot;
use crate::stream::StreamConsumer;
use bridge_traits::SettingsStore;
use chrono::{DateTime, Utc};
use core_async::sync::{broadcast, CancellationToken, Mutex};
use core_async::task::with_cancellation;
use core_async::time::{as_millis_u64, interval, Instant, MissedTickBehavior};
use core_runtime::config::{CoreConfig, EtaConfig};
use core_runtime::events::{
    CatalogEvent, CoreEvent, EventBus, EventSeverity, SyncRunEvent,
};
use core_sync::api::{CleanupStatus, SheetColumnsData, SyncRequest, TableInfo};
use core_sync::{get_auto_mapping, messages, ColumnMapping, RealTimeStats, SyncEvent, SyncResult, SyncRunId};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where the mapping of a selected table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    /// Persisted from an earlier session.
    Stored,
    /// Derived from header names.
    Auto,
    /// Changed by the operator.
    Edited,
}

impl MappingOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingOrigin::Stored => "stored",
            MappingOrigin::Auto => "auto",
            MappingOrigin::Edited => "edited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSelection {
    pub schema: TableSchema,
    pub mapping: ColumnMapping,
    pub origin: MappingOrigin,
}

/// Shared view of the running sync, read by the local ticker.
struct LiveRun {
    eta: EtaEstimator,
    stats: RealTimeStats,
}

pub struct SyncSession {
    api: Arc<SyncApiClient>,
    sheets: SheetReader,
    schema: SchemaInspector,
    mappings: MappingStore,
    settings: Arc<dyn SettingsStore>,
    eta_config: EtaConfig,
    event_bus: EventBus,
    root: CancellationToken,
    sync_slot: RequestSlot,
}

impl SyncSession {
    pub fn new(config: CoreConfig) -> Self {
        let root = CancellationToken::new();
        let api = Arc::new(SyncApiClient::from_config(&config));
        Self {
            sheets: SheetReader::new(
                api.clone(),
                config.sheet_name_prefix.clone(),
                config.timeouts.list_sheets,
                &root,
            ),
            schema: SchemaInspector::new(api.clone(), config.timeouts, &root),
            mappings: MappingStore::new(config.settings_store.clone()),
            settings: config.settings_store.clone(),
            eta_config: config.eta,
            event_bus: EventBus::new(config.event_buffer_size),
            sync_slot: RequestSlot::new(&root),
            root,
            api,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine.
        let _ = self.event_bus.emit(event);
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn list_sheets(&self, spreadsheet_id: &str) -> Result<SheetListing> {
        let listing = self.sheets.list_sheets(spreadsheet_id).await?;
        let event = match &listing {
            SheetListing::Sheets(sheets) => CatalogEvent::SheetsLoaded {
                spreadsheet_id: spreadsheet_id.to_string(),
                sheet_names: sheets.iter().map(|s| s.name.clone()).collect(),
            },
            SheetListing::NoValidSheets => CatalogEvent::NoValidSheets {
                spreadsheet_id: spreadsheet_id.to_string(),
            },
        };
        self.emit(CoreEvent::Catalog(event));
        Ok(listing)
    }

    pub async fn load_sheet_columns(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<SheetColumnsData> {
        let data = self.sheets.load_columns(spreadsheet_id, sheet_name).await?;
        self.emit(CoreEvent::Catalog(CatalogEvent::SheetColumnsLoaded {
            sheet_name: sheet_name.to_string(),
            columns: data.columns.clone(),
        }));
        Ok(data)
    }

    pub async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let tables = self.api.all_tables().await?.tables;
        self.emit(CoreEvent::Catalog(CatalogEvent::TablesLoaded {
            count: tables.len(),
        }));
        Ok(tables)
    }

    /// Load the schema of `table` and the mapping to start from: the stored
    /// one if any, otherwise one derived from `source_columns`.
    #[instrument(skip(self, source_columns))]
    pub async fn select_table(
        &self,
        table: &str,
        source_columns: &[String],
    ) -> Result<TableSelection> {
        let schema = self.schema.get_table_schema(table).await?;
        self.emit(CoreEvent::Catalog(CatalogEvent::TableSchemaLoaded {
            table: table.to_string(),
            column_count: schema.columns.len(),
            fallback: schema.is_fallback(),
        }));

        let (mapping, origin) = match self.mappings.load(table).await {
            Some(mapping) => (mapping, MappingOrigin::Stored),
            None => (
                get_auto_mapping(&schema.columns, source_columns),
                MappingOrigin::Auto,
            ),
        };
        self.emit_mapping_changed(table, &mapping, origin);

        Ok(TableSelection {
            schema,
            mapping,
            origin,
        })
    }

    /// Persist an operator-edited mapping.
    pub async fn update_mapping(&self, table: &str, mapping: &ColumnMapping) -> Result<()> {
        self.mappings.save(table, mapping).await?;
        self.emit_mapping_changed(table, mapping, MappingOrigin::Edited);
        Ok(())
    }

    fn emit_mapping_changed(&self, table: &str, mapping: &ColumnMapping, origin: MappingOrigin) {
        self.emit(CoreEvent::Catalog(CatalogEvent::MappingChanged {
            table: table.to_string(),
            mapped_columns: mapping.len(),
            origin: origin.as_str().to_string(),
        }));
    }

    pub async fn last_sync_time(
        &self,
        table: &str,
        spreadsheet_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .api
            .sync_history(table, spreadsheet_id)
            .await?
            .last_sync_time)
    }

    pub async fn cleanup_status(&self) -> Result<CleanupStatus> {
        self.api.reservation_cleanup().await
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Run a streaming sync and wait for its outcome.
    ///
    /// `expected_rows` seeds the ETA before the server declares a total.
    /// Starting another run cancels this one.
    #[instrument(skip(self, request), fields(table = %request.target_table))]
    pub async fn run_sync(&self, request: SyncRequest, expected_rows: Option<u64>) -> SyncResult {
        let run_id = SyncRunId::new().to_string();
        let token = self.sync_slot.begin().await;

        let baseline =
            eta::load_baseline(self.settings.as_ref(), self.eta_config.default_ms_per_row).await;
        let mut estimator = EtaEstimator::new(baseline);
        estimator.begin(expected_rows, Instant::now());
        let estimated_duration_ms = estimator.estimated_duration_ms();
        let live = Arc::new(Mutex::new(LiveRun {
            eta: estimator,
            stats: RealTimeStats::default(),
        }));

        self.emit(CoreEvent::Sync(SyncRunEvent::Started {
            run_id: run_id.clone(),
            table: request.target_table.clone(),
            estimated_rows: expected_rows,
            estimated_duration_ms,
        }));

        let ticker = token.child_token();
        core_async::spawn(tick_progress(
            live.clone(),
            self.event_bus.clone(),
            run_id.clone(),
            self.eta_config.tick_interval,
            ticker.clone(),
        ));

        let outcome = self.drive_stream(&request, &token, &live, &run_id).await;
        ticker.cancel();
        self.sync_slot.finish(&token).await;

        let result = match outcome {
            Ok(result) => result,
            Err(ClientError::Cancelled) => {
                let processed = live.lock().await.stats.processed;
                info!(processed, "Sync cancelled");
                self.emit(CoreEvent::Sync(SyncRunEvent::Cancelled { run_id, processed }));
                return SyncResult::failure(messages::CANCELLED);
            }
            Err(e) => {
                warn!(error = %e, "Sync stream failed");
                SyncResult::failure(e.user_message())
            }
        };

        self.settle(&run_id, &result, &live).await;
        result
    }

    /// Single round trip without live progress.
    #[instrument(skip(self, request), fields(table = %request.target_table))]
    pub async fn run_optimized(&self, request: SyncRequest) -> SyncResult {
        let run_id = SyncRunId::new().to_string();
        let token = self.sync_slot.begin().await;
        let started = Instant::now();

        self.emit(CoreEvent::Sync(SyncRunEvent::Started {
            run_id: run_id.clone(),
            table: request.target_table.clone(),
            estimated_rows: None,
            estimated_duration_ms: eta::MIN_ESTIMATED_DURATION_MS,
        }));

        let outcome = with_cancellation(&token, self.api.sync_optimized(&request)).await;
        self.sync_slot.finish(&token).await;

        let result = match outcome {
            None => {
                self.emit(CoreEvent::Sync(SyncRunEvent::Cancelled {
                    run_id,
                    processed: 0,
                }));
                return SyncResult::failure(messages::CANCELLED);
            }
            Some(Ok(result)) => result,
            Some(Err(e)) => SyncResult::failure(e.user_message()),
        };

        let event = if result.success {
            let details = result.data.unwrap_or_default();
            SyncRunEvent::Completed {
                run_id,
                message: result.message.clone(),
                inserted: details.inserted,
                updated: details.updated,
                errors: details.errors,
                duration_ms: as_millis_u64(started.elapsed()),
            }
        } else {
            SyncRunEvent::Failed {
                run_id,
                message: result.message.clone(),
            }
        };
        self.emit(CoreEvent::Sync(event));
        result
    }

    /// Cancel the running sync, if any.
    pub async fn cancel_sync(&self) {
        self.sync_slot.cancel().await;
    }

    /// Cancel every outstanding request of this session.
    pub fn teardown(&self) {
        debug!("Tearing down sync session");
        self.root.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.root.is_cancelled()
    }

    async fn drive_stream(
        &self,
        request: &SyncRequest,
        token: &CancellationToken,
        live: &Mutex<LiveRun>,
        run_id: &str,
    ) -> Result<SyncResult> {
        let mut body = with_cancellation(token, self.api.open_sync_stream(request))
            .await
            .ok_or(ClientError::Cancelled)??;

        let mut consumer = StreamConsumer::new();
        loop {
            let next = with_cancellation(token, body.next())
                .await
                .ok_or(ClientError::Cancelled)?;
            match next {
                None => break,
                Some(Ok(chunk)) => {
                    for event in consumer.push(&chunk) {
                        self.handle_event(&event, live, run_id).await;
                    }
                    if consumer.is_settled() {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }

        let (result, trailing) = consumer.finish();
        for event in &trailing {
            self.handle_event(event, live, run_id).await;
        }
        Ok(result)
    }

    async fn handle_event(&self, event: &SyncEvent, live: &Mutex<LiveRun>, run_id: &str) {
        let now = Instant::now();
        match event {
            SyncEvent::Start { total } => {
                live.lock().await.eta.set_total(Some(*total));
            }
            SyncEvent::Progress {
                processed, total, ..
            } => {
                // Emitted under the lock so the ticker cannot publish in between.
                let mut live = live.lock().await;
                live.stats.absorb(event);
                let percent = live.eta.observe_progress(*processed, *total, now);
                let eta_ms = live.eta.remaining_ms(now);
                self.emit(progress_event(run_id, &live.stats, Some(*total), percent, eta_ms));
            }
            SyncEvent::Info { message } => self.emit_log(run_id, EventSeverity::Info, message),
            SyncEvent::Warn { message } => self.emit_log(run_id, EventSeverity::Warning, message),
            SyncEvent::Error { message, .. } => {
                self.emit_log(run_id, EventSeverity::Error, message)
            }
            SyncEvent::Result(_) => {}
        }
    }

    fn emit_log(&self, run_id: &str, level: EventSeverity, message: &str) {
        self.emit(CoreEvent::Sync(SyncRunEvent::Log {
            run_id: run_id.to_string(),
            level,
            message: message.to_string(),
        }));
    }

    /// Publish the outcome and, on success, remember the measured rate.
    async fn settle(&self, run_id: &str, result: &SyncResult, live: &Mutex<LiveRun>) {
        if !result.success {
            self.emit(CoreEvent::Sync(SyncRunEvent::Failed {
                run_id: run_id.to_string(),
                message: result.message.clone(),
            }));
            return;
        }

        let details = result.data.unwrap_or_default();
        let ms_per_row = live
            .lock()
            .await
            .eta
            .complete(details.inserted, details.updated, Instant::now());
        if let Err(e) = eta::save_baseline(self.settings.as_ref(), ms_per_row).await {
            warn!(error = %e, "Failed to persist ETA baseline");
        }

        self.emit(CoreEvent::Sync(SyncRunEvent::Completed {
            run_id: run_id.to_string(),
            message: result.message.clone(),
            inserted: details.inserted,
            updated: details.updated,
            errors: details.errors,
            duration_ms: details.duration_ms,
        }));
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn progress_event(
    run_id: &str,
    stats: &RealTimeStats,
    total: Option<u64>,
    percent: u8,
    eta_ms: Option<u64>,
) -> CoreEvent {
    CoreEvent::Sync(SyncRunEvent::Progress {
        run_id: run_id.to_string(),
        processed: stats.processed,
        inserted: stats.inserted,
        updated: stats.updated,
        errors: stats.errors,
        total,
        percent,
        eta_ms,
    })
}

/// Advance the local ETA clock until `stop` fires.
async fn tick_progress(
    live: Arc<Mutex<LiveRun>>,
    event_bus: EventBus,
    run_id: String,
    period: std::time::Duration,
    stop: CancellationToken,
) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    while with_cancellation(&stop, ticks.tick()).await.is_some() {
        if stop.is_cancelled() {
            break;
        }
        let now = Instant::now();
        let mut guard = live.lock().await;
        let percent = guard.eta.tick(now);
        let eta_ms = guard.eta.remaining_ms(now);
        let event = progress_event(&run_id, &guard.stats, guard.eta.total(), percent, eta_ms);
        let _ = event_bus.emit(event);
    }
}
