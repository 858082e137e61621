//! # Sync Orchestrator
//!
//! Applies the rows of one sheet to one destination table under a column
//! mapping.
//!
//! ## Streaming
//!
//! [`SyncOrchestrator::run_streaming`] spawns the run and hands back a
//! [`SyncEventStream`]. Events are produced in wire order: log lines, one
//! `start`, `progress` every [`SyncConfig::progress_interval`] rows (and
//! after the last row), then exactly one `result`.
//!
//! Per-row failures (type mismatches, constraint violations) are counted and
//! reported as `error` events; the run continues. Only whole-run failures
//! (unreadable sheet or schema, failed truncate, unusable store) end it with
//! `success: false`.
//!
//! Cancelling the token or dropping the stream stops the run before the next
//! row. Rows already written stay written.
//!
//! ## Optimized
//!
//! [`SyncOrchestrator::run_optimized`] performs the same insert-or-update
//! decisions through a single [`TableStore::apply_batch`] call and returns
//! only the final [`SyncResult`].

use crate::api::SyncRequest;
use crate::config::SyncConfig;
use crate::event::{SyncDetails, SyncEvent, SyncResult};
use crate::job::{RunStats, RunStatus, SyncMode, SyncRun, SyncRunId};
use crate::mapping::check_mapping;
use crate::messages;
use crate::record::RowProjector;
use crate::repository::SyncRunRepository;
use crate::{Result, SyncError};
use bridge_traits::database::{RowOutcome, TableRecord, TableStore};
use bridge_traits::error::BridgeError;
use bridge_traits::sheets::{SheetSource, SheetValues};
use core_async::sync::{mpsc, CancellationToken};
use core_async::task::with_cancellation;
use core_async::time::{as_millis_u64, Instant};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, error, info, instrument, warn};

/// Receiving end of a streaming run.
///
/// Dropping it cancels the run at the next row boundary.
pub struct SyncEventStream {
    rx: mpsc::Receiver<SyncEvent>,
}

impl SyncEventStream {
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.rx.recv().await
    }

    /// Drain the stream until the run ends.
    pub async fn collect_all(mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for SyncEventStream {
    type Item = SyncEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Sending side of a run, mirroring every event into `tracing`.
struct EventSink {
    tx: mpsc::Sender<SyncEvent>,
    run_id: SyncRunId,
}

impl EventSink {
    async fn send(&self, event: SyncEvent) {
        match &event {
            SyncEvent::Info { message } => info!(run_id = %self.run_id, "{}", message),
            SyncEvent::Warn { message } => warn!(run_id = %self.run_id, "{}", message),
            SyncEvent::Error { message, row } => {
                error!(run_id = %self.run_id, row = ?row, "{}", message)
            }
            SyncEvent::Start { total } => debug!(run_id = %self.run_id, total, "Run started"),
            SyncEvent::Progress {
                processed, total, ..
            } => debug!(run_id = %self.run_id, processed, total, "Run progress"),
            SyncEvent::Result(result) => info!(
                run_id = %self.run_id,
                success = result.success,
                "{}",
                result.message
            ),
        }

        // A closed receiver is picked up by `is_closed` at the next row.
        let _ = self.tx.send(event).await;
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything resolved before the first row is written.
struct Plan {
    values: SheetValues,
    projector: RowProjector,
    key_columns: Vec<String>,
    notes: Vec<SyncEvent>,
}

/// Drives sync runs against a sheet source and a destination store.
#[derive(Clone)]
pub struct SyncOrchestrator {
    source: Arc<dyn SheetSource>,
    store: Arc<dyn TableStore>,
    runs: Option<Arc<dyn SyncRunRepository>>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn SheetSource>,
        store: Arc<dyn TableStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            runs: None,
            config,
        }
    }

    /// Record every run in `runs`.
    pub fn with_history(mut self, runs: Arc<dyn SyncRunRepository>) -> Self {
        self.runs = Some(runs);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start a streaming run in the background.
    pub fn run_streaming(&self, request: SyncRequest, cancel: CancellationToken) -> SyncEventStream {
        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        let orchestrator = self.clone();
        core_async::spawn(async move {
            orchestrator.stream_into(request, cancel, tx).await;
        });
        SyncEventStream { rx }
    }

    /// Run to completion on the current task, sending every event to `tx`.
    ///
    /// The returned result is also the last event sent.
    #[instrument(
        skip(self, request, cancel, tx),
        fields(table = %request.target_table, sheet = %request.sheet_name)
    )]
    pub async fn stream_into(
        &self,
        request: SyncRequest,
        cancel: CancellationToken,
        tx: mpsc::Sender<SyncEvent>,
    ) -> SyncResult {
        let started = Instant::now();
        let run = SyncRun::start(
            &request.target_table,
            &request.spreadsheet_id,
            &request.sheet_name,
            SyncMode::Streaming,
            request.truncate_table,
        );
        self.record_start(&run).await;

        let sink = EventSink {
            tx,
            run_id: run.id,
        };
        let mut stats = RunStats::default();

        sink.send(SyncEvent::info(messages::preparing(
            &request.sheet_name,
            &request.target_table,
        )))
        .await;

        let mut plan = match with_cancellation(&cancel, self.prepare(&request)).await {
            None => return self.end_cancelled(run, stats, &request, started, &sink).await,
            Some(Err(e)) => {
                let message = failure_message(&e);
                sink.send(SyncEvent::error(message.clone())).await;
                return self.end_failed(run, stats, &request, started, message, &sink).await;
            }
            Some(Ok(plan)) => plan,
        };

        for note in std::mem::take(&mut plan.notes) {
            sink.send(note).await;
        }

        let total = plan.values.rows.len() as u64;
        stats.total = Some(total);
        sink.send(SyncEvent::Start { total }).await;

        if request.truncate_table {
            match self.store.truncate(&request.target_table).await {
                Ok(removed) => sink.send(SyncEvent::info(messages::truncated(removed))).await,
                Err(e) => {
                    let message = messages::truncate_failed(&e.to_string());
                    sink.send(SyncEvent::error(message.clone())).await;
                    return self.end_failed(run, stats, &request, started, message, &sink).await;
                }
            }
        }

        let interval = self.config.progress_interval.max(1);
        for (index, row) in plan.values.rows.iter().enumerate() {
            if cancel.is_cancelled() || sink.is_closed() {
                return self.end_cancelled(run, stats, &request, started, &sink).await;
            }

            let row_number = index as u64 + 2;
            match self
                .apply_row(&request.target_table, &plan, row)
                .await
            {
                Ok(RowOutcome::Inserted) => stats.inserted += 1,
                Ok(RowOutcome::Updated) => stats.updated += 1,
                Err(RowError::Row(reason)) => {
                    stats.errors += 1;
                    sink.send(SyncEvent::row_error(
                        row_number,
                        messages::row_failed(row_number, &reason),
                    ))
                    .await;
                }
                Err(RowError::Fatal(e)) => {
                    let message = messages::store_failed(&e.to_string());
                    sink.send(SyncEvent::error(message.clone())).await;
                    return self.end_failed(run, stats, &request, started, message, &sink).await;
                }
            }
            stats.processed += 1;

            if stats.processed % interval == 0 || stats.processed == total {
                sink.send(progress_event(&stats, total)).await;
            }
        }

        let details = details(&stats, request.truncate_table, started);
        let message = messages::completed(stats.inserted, stats.updated, stats.errors);
        let result = SyncResult::completed(message.clone(), details);

        self.record_finish(run, RunStatus::Completed, stats, &message)
            .await;
        sink.send(SyncEvent::Result(result.clone())).await;
        result
    }

    /// Single round trip: same insert-or-update semantics, no event stream.
    #[instrument(
        skip(self, request),
        fields(table = %request.target_table, sheet = %request.sheet_name)
    )]
    pub async fn run_optimized(&self, request: SyncRequest) -> SyncResult {
        let started = Instant::now();
        let run = SyncRun::start(
            &request.target_table,
            &request.spreadsheet_id,
            &request.sheet_name,
            SyncMode::Optimized,
            request.truncate_table,
        );
        self.record_start(&run).await;
        let mut stats = RunStats::default();

        let plan = match self.prepare(&request).await {
            Ok(plan) => plan,
            Err(e) => {
                let message = failure_message(&e);
                warn!(run_id = %run.id, "{}", message);
                self.record_finish(run, RunStatus::Failed, stats, &message)
                    .await;
                return SyncResult::failure(message);
            }
        };

        for note in &plan.notes {
            if let SyncEvent::Warn { message } = note {
                warn!(run_id = %run.id, "{}", message);
            }
        }

        let total = plan.values.rows.len() as u64;
        stats.total = Some(total);

        if request.truncate_table {
            if let Err(e) = self.store.truncate(&request.target_table).await {
                let message = messages::truncate_failed(&e.to_string());
                warn!(run_id = %run.id, "{}", message);
                self.record_finish(run, RunStatus::Failed, stats, &message)
                    .await;
                return SyncResult::failure(message)
                    .with_details(details(&stats, true, started));
            }
        }

        let mut records: Vec<TableRecord> = Vec::with_capacity(plan.values.rows.len());
        let mut row_numbers: Vec<u64> = Vec::with_capacity(plan.values.rows.len());
        for (index, row) in plan.values.rows.iter().enumerate() {
            let row_number = index as u64 + 2;
            match plan.projector.project(row) {
                Ok(record) => {
                    records.push(record);
                    row_numbers.push(row_number);
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(run_id = %run.id, "{}", messages::row_failed(row_number, &e.to_string()));
                }
            }
        }

        let batch = match self
            .store
            .apply_batch(&request.target_table, &plan.key_columns, &records)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                let message = messages::store_failed(&e.to_string());
                warn!(run_id = %run.id, "{}", message);
                self.record_finish(run, RunStatus::Failed, stats, &message)
                    .await;
                return SyncResult::failure(message)
                    .with_details(details(&stats, request.truncate_table, started));
            }
        };

        for failure in &batch.failures {
            let row_number = row_numbers.get(failure.index).copied().unwrap_or(0);
            warn!(
                run_id = %run.id,
                "{}",
                messages::row_failed(row_number, &failure.message)
            );
        }

        stats.inserted = batch.inserted;
        stats.updated = batch.updated;
        stats.errors += batch.failures.len() as u64;
        stats.processed = total;

        let message = messages::completed(stats.inserted, stats.updated, stats.errors);
        self.record_finish(run, RunStatus::Completed, stats, &message)
            .await;

        SyncResult::completed(message, details(&stats, request.truncate_table, started))
            .with_count(stats.processed)
    }

    async fn prepare(&self, request: &SyncRequest) -> Result<Plan> {
        request.validate().map_err(SyncError::InvalidRequest)?;

        let columns = self
            .store
            .table_columns(&request.target_table)
            .await
            .map_err(SyncError::Store)?;

        let values = self
            .source
            .read_values(&request.spreadsheet_id, &request.sheet_name, None)
            .await
            .map_err(SyncError::Source)?;

        if values.header.is_empty() {
            return Err(SyncError::InvalidRequest(messages::EMPTY_SHEET.to_string()));
        }

        let mut notes = vec![SyncEvent::info(messages::rows_loaded(values.rows.len()))];

        let report = check_mapping(&request.column_mapping, &columns, &values.header);
        if !report.unknown_destinations.is_empty() {
            notes.push(SyncEvent::warn(messages::unknown_destinations(
                &report.unknown_destinations,
            )));
        }
        if !report.stale_sources.is_empty() {
            notes.push(SyncEvent::warn(messages::stale_sources(&report.stale_sources)));
        }

        let projector = RowProjector::new(&report.effective, &values, &columns);
        if projector.is_empty() {
            return Err(SyncError::InvalidRequest(
                messages::NO_MAPPED_COLUMNS.to_string(),
            ));
        }

        let key_columns = if request.truncate_table || !request.enable_incremental_sync {
            Vec::new()
        } else {
            let candidate = self
                .config
                .natural_keys
                .get(&request.target_table)
                .cloned()
                .unwrap_or_else(|| {
                    columns
                        .iter()
                        .filter(|c| c.primary_key)
                        .map(|c| c.name.clone())
                        .collect()
                });
            let mapped: Vec<&str> = projector.columns().collect();
            if !candidate.is_empty() && candidate.iter().all(|k| mapped.contains(&k.as_str())) {
                candidate
            } else {
                notes.push(SyncEvent::warn(messages::no_natural_key(
                    &request.target_table,
                )));
                Vec::new()
            }
        };

        debug!(
            rows = values.rows.len(),
            keys = ?key_columns,
            "Sync plan ready"
        );

        Ok(Plan {
            values,
            projector,
            key_columns,
            notes,
        })
    }

    async fn apply_row(
        &self,
        table: &str,
        plan: &Plan,
        row: &[String],
    ) -> std::result::Result<RowOutcome, RowError> {
        let record = plan
            .projector
            .project(row)
            .map_err(|e| RowError::Row(e.to_string()))?;

        match self.store.upsert(table, &plan.key_columns, &record).await {
            Ok(outcome) => Ok(outcome),
            Err(BridgeError::DatabaseError(reason)) | Err(BridgeError::OperationFailed(reason)) => {
                Err(RowError::Row(reason))
            }
            Err(e) => Err(RowError::Fatal(e)),
        }
    }

    async fn end_failed(
        &self,
        run: SyncRun,
        stats: RunStats,
        request: &SyncRequest,
        started: Instant,
        message: String,
        sink: &EventSink,
    ) -> SyncResult {
        self.record_finish(run, RunStatus::Failed, stats, &message)
            .await;
        let result = SyncResult::failure(message)
            .with_details(details(&stats, request.truncate_table, started));
        sink.send(SyncEvent::Result(result.clone())).await;
        result
    }

    async fn end_cancelled(
        &self,
        run: SyncRun,
        stats: RunStats,
        request: &SyncRequest,
        started: Instant,
        sink: &EventSink,
    ) -> SyncResult {
        info!(run_id = %run.id, processed = stats.processed, "Sync run cancelled");
        self.record_finish(run, RunStatus::Cancelled, stats, messages::CANCELLED)
            .await;
        let result = SyncResult::failure(messages::CANCELLED)
            .with_details(details(&stats, request.truncate_table, started));
        // Best effort; the receiver is usually gone already.
        sink.send(SyncEvent::Result(result.clone())).await;
        result
    }

    async fn record_start(&self, run: &SyncRun) {
        if let Some(runs) = &self.runs {
            if let Err(e) = runs.insert(run).await {
                warn!(run_id = %run.id, error = %e, "Failed to record sync run");
            }
        }
    }

    async fn record_finish(&self, run: SyncRun, status: RunStatus, stats: RunStats, message: &str) {
        let Some(runs) = &self.runs else {
            return;
        };
        let finished = match status {
            RunStatus::Completed => run.complete(stats, message),
            RunStatus::Failed => run.fail(stats, message),
            RunStatus::Cancelled => run.cancel(stats, message),
            RunStatus::Running => return,
        };
        match finished {
            Ok(run) => {
                if let Err(e) = runs.update(&run).await {
                    warn!(run_id = %run.id, error = %e, "Failed to update sync run");
                }
            }
            Err(e) => warn!(error = %e, "Invalid sync run transition"),
        }
    }
}

enum RowError {
    /// The row is skipped and counted.
    Row(String),
    /// The store is unusable; the run ends.
    Fatal(BridgeError),
}

fn progress_event(stats: &RunStats, total: u64) -> SyncEvent {
    SyncEvent::Progress {
        processed: stats.processed,
        inserted: stats.inserted,
        updated: stats.updated,
        errors: stats.errors,
        total,
    }
}

fn details(stats: &RunStats, truncated: bool, started: Instant) -> SyncDetails {
    SyncDetails {
        inserted: stats.inserted,
        updated: stats.updated,
        errors: stats.errors,
        processed: stats.processed,
        total: stats.total.unwrap_or(0),
        duration_ms: as_millis_u64(started.elapsed()),
        truncated,
    }
}

fn failure_message(error: &SyncError) -> String {
    match error {
        SyncError::Store(e) => messages::schema_failed(&e.to_string()),
        SyncError::Source(e) => messages::source_failed(&e.to_string()),
        SyncError::InvalidRequest(message) => message.clone(),
        other => other.to_string(),
    }
}
