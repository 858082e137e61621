//! # Sync Run State Machine
//!
//! Lifecycle of one sheet-to-table sync run with validated transitions.
//!
//! ## State Machine
//!
//! ```text
//! Running → Completed
//!    ├────→ Failed
//!    └────→ Cancelled
//! ```
//!
//! Terminal states never transition again. Runs are persisted through
//! [`SyncRunRepository`](crate::repository::SyncRunRepository) and back the
//! sync-history endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut run = SyncRun::start("reservations", "1AbC", "S_0501", SyncMode::Streaming, false);
//! run.update_progress(RunStats { total: Some(100), processed: 10, inserted: 10, ..Default::default() })?;
//! let run = run.complete(stats, "동기화 완료")?;
//! ```

use crate::{Result, SyncError};
use core_async::time::now_millis;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidRunId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RunStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which endpoint drove the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Row-by-row with a live event stream
    Streaming,
    /// Single batched round trip
    Optimized,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Streaming => "streaming",
            SyncMode::Optimized => "optimized",
        }
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "streaming" => Ok(SyncMode::Streaming),
            "optimized" => Ok(SyncMode::Optimized),
            _ => Err(SyncError::InvalidMode(s.to_string())),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Rows in the sheet; unknown until the sheet has been read
    pub total: Option<u64>,
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
}

impl RunStats {
    pub fn percent(&self) -> u8 {
        match self.total {
            Some(total) if total > 0 => {
                ((self.processed as f64 / total as f64) * 100.0).min(100.0) as u8
            }
            _ => 0,
        }
    }
}

// ============================================================================
// Sync Run Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub target_table: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub mode: SyncMode,
    pub truncate_table: bool,
    pub status: RunStatus,
    pub stats: RunStats,
    /// Final result message, or the failure reason
    pub message: Option<String>,
    /// Unix epoch milliseconds
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl SyncRun {
    /// Create a run that is already running.
    pub fn start(
        target_table: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        mode: SyncMode,
        truncate_table: bool,
    ) -> Self {
        Self {
            id: SyncRunId::new(),
            target_table: target_table.into(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            mode,
            truncate_table,
            status: RunStatus::Running,
            stats: RunStats::default(),
            message: None,
            started_at: now_millis() as i64,
            completed_at: None,
        }
    }

    /// Replace the counters of a running run
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not running
    pub fn update_progress(&mut self, stats: RunStats) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: "update_progress".to_string(),
                reason: "Run must be running to update progress".to_string(),
            });
        }
        self.stats = stats;
        Ok(())
    }

    pub fn complete(self, stats: RunStats, message: impl Into<String>) -> Result<Self> {
        self.finish(RunStatus::Completed, stats, message.into())
    }

    pub fn fail(self, stats: RunStats, message: impl Into<String>) -> Result<Self> {
        self.finish(RunStatus::Failed, stats, message.into())
    }

    pub fn cancel(self, stats: RunStats, message: impl Into<String>) -> Result<Self> {
        self.finish(RunStatus::Cancelled, stats, message.into())
    }

    /// Wall-clock duration in milliseconds, once finished
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|end| end.saturating_sub(self.started_at).max(0) as u64)
    }

    fn finish(mut self, to: RunStatus, stats: RunStats, message: String) -> Result<Self> {
        self.validate_transition(to)?;
        self.status = to;
        self.stats = stats;
        self.message = Some(message);
        self.completed_at = Some(now_millis() as i64);
        Ok(self)
    }

    fn validate_transition(&self, to: RunStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Cancelled)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> SyncRun {
        SyncRun::start("reservations", "sid", "S_0501", SyncMode::Streaming, false)
    }

    fn stats(processed: u64) -> RunStats {
        RunStats {
            total: Some(100),
            processed,
            inserted: processed,
            updated: 0,
            errors: 0,
        }
    }

    #[test]
    fn test_run_id_round_trip() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = SyncRunId::from_string(uuid_str).unwrap();
        assert_eq!(id.as_str(), uuid_str);
        assert!(SyncRunId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("COMPLETED".parse::<RunStatus>().unwrap(), RunStatus::Completed);
        assert!("pending".parse::<RunStatus>().is_err());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("optimized".parse::<SyncMode>().unwrap(), SyncMode::Optimized);
        assert!("batch".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_percent() {
        assert_eq!(stats(50).percent(), 50);
        assert_eq!(RunStats::default().percent(), 0);
        let over = RunStats {
            total: Some(10),
            processed: 20,
            ..Default::default()
        };
        assert_eq!(over.percent(), 100);
    }

    #[test]
    fn test_new_run_is_running() {
        let run = run();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.completed_at.is_none());
        assert!(run.duration_ms().is_none());
    }

    #[test]
    fn test_update_progress() {
        let mut run = run();
        run.update_progress(stats(40)).unwrap();
        assert_eq!(run.stats.processed, 40);
    }

    #[test]
    fn test_complete() {
        let run = run().complete(stats(100), "done").unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.message.as_deref(), Some("done"));
        assert!(run.duration_ms().is_some());
    }

    #[test]
    fn test_fail_and_cancel() {
        let failed = run().fail(stats(3), "truncate failed").unwrap();
        assert_eq!(failed.status, RunStatus::Failed);

        let cancelled = run().cancel(stats(7), "cancelled").unwrap();
        assert_eq!(cancelled.status, RunStatus::Cancelled);
        assert_eq!(cancelled.stats.processed, 7);
    }

    #[test]
    fn test_terminal_states_cannot_transition() {
        let completed = run().complete(stats(100), "done").unwrap();

        assert!(completed.clone().fail(stats(0), "x").is_err());
        assert!(completed.clone().cancel(stats(0), "x").is_err());
        assert!(completed.clone().complete(stats(0), "x").is_err());

        let mut completed = completed;
        assert!(completed.update_progress(stats(1)).is_err());
    }
}
