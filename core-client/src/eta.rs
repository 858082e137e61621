//! # Progress / ETA Estimator
//!
//! Projects how long a run will take from a persisted milliseconds-per-row
//! baseline and drives a progress percentage that ticks locally until the
//! server reports real progress.
//!
//! - Before the first server `progress`: `duration = max(rows × ms_per_row,
//!   1500ms)`, the local percentage follows elapsed time and stops at 95%.
//! - Once progress arrives: the live rate `elapsed / processed` refines the
//!   remaining time, and the displayed percentage is the larger of the local
//!   and server percentages. It never goes down within a run.
//! - After a successful run the baseline becomes `elapsed / max(inserted +
//!   updated, 1)`, clamped to [3, 200]. Failed or cancelled runs leave it
//!   untouched.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::SettingsStore;
use core_async::time::{as_millis_u64, Instant};
use tracing::{debug, warn};

/// Settings key of the persisted baseline.
pub const BASELINE_KEY: &str = "sync.eta.ms_per_row";
pub const MIN_MS_PER_ROW: f64 = 3.0;
pub const MAX_MS_PER_ROW: f64 = 200.0;
pub const MIN_ESTIMATED_DURATION_MS: u64 = 1500;
/// Highest percentage the local clock alone may show.
pub const LOCAL_PROGRESS_CAP: u8 = 95;

/// Clamp a measured rate into the accepted baseline range.
pub fn clamp_ms_per_row(ms_per_row: f64) -> f64 {
    if ms_per_row.is_nan() {
        return MIN_MS_PER_ROW;
    }
    ms_per_row.clamp(MIN_MS_PER_ROW, MAX_MS_PER_ROW)
}

/// Load the baseline from `store`, falling back to `default` when absent or
/// unreadable.
pub async fn load_baseline(store: &dyn SettingsStore, default: f64) -> f64 {
    match store.get_f64(BASELINE_KEY).await {
        Ok(Some(value)) => clamp_ms_per_row(value),
        Ok(None) => clamp_ms_per_row(default),
        Err(e) => {
            warn!(error = %e, "Failed to read ETA baseline");
            clamp_ms_per_row(default)
        }
    }
}

pub async fn save_baseline(store: &dyn SettingsStore, ms_per_row: f64) -> BridgeResult<()> {
    store
        .set_f64(BASELINE_KEY, clamp_ms_per_row(ms_per_row))
        .await
}

#[derive(Debug, Clone)]
pub struct EtaEstimator {
    ms_per_row: f64,
    started_at: Option<Instant>,
    total: Option<u64>,
    processed: u64,
    estimated_ms: u64,
    live_ms_per_row: Option<f64>,
    displayed: u8,
}

impl EtaEstimator {
    pub fn new(ms_per_row: f64) -> Self {
        Self {
            ms_per_row: clamp_ms_per_row(ms_per_row),
            started_at: None,
            total: None,
            processed: 0,
            estimated_ms: MIN_ESTIMATED_DURATION_MS,
            live_ms_per_row: None,
            displayed: 0,
        }
    }

    pub fn ms_per_row(&self) -> f64 {
        self.ms_per_row
    }

    pub fn percent(&self) -> u8 {
        self.displayed
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Projected duration of the whole run.
    pub fn estimated_duration_ms(&self) -> u64 {
        self.estimated_ms
    }

    /// Start a run. `total_rows` may be unknown until the server's `start`.
    pub fn begin(&mut self, total_rows: Option<u64>, now: Instant) {
        self.started_at = Some(now);
        self.processed = 0;
        self.live_ms_per_row = None;
        self.displayed = 0;
        self.set_total(total_rows);
    }

    /// The server declared the row count.
    pub fn set_total(&mut self, total_rows: Option<u64>) {
        self.total = total_rows;
        let projected = total_rows
            .map(|rows| (rows as f64 * self.ms_per_row).round() as u64)
            .unwrap_or(0);
        self.estimated_ms = projected.max(MIN_ESTIMATED_DURATION_MS);
    }

    /// Advance the local clock.
    pub fn tick(&mut self, now: Instant) -> u8 {
        let local = self.local_percent(now);
        self.displayed = self.displayed.max(local);
        self.displayed
    }

    /// Fold in a server `progress` event.
    pub fn observe_progress(&mut self, processed: u64, total: u64, now: Instant) -> u8 {
        if self.total.is_none() && total > 0 {
            self.set_total(Some(total));
        }
        self.processed = self.processed.max(processed);

        let elapsed = self.elapsed_ms(now);
        if self.processed > 0 {
            self.live_ms_per_row = Some(elapsed as f64 / self.processed as f64);
        }

        let server = match self.total {
            Some(total) if total > 0 => {
                ((self.processed as f64 / total as f64) * 100.0).min(100.0) as u8
            }
            _ => 0,
        };
        let local = self.local_percent(now);
        self.displayed = self.displayed.max(local).max(server);
        self.displayed
    }

    /// Projected time left, preferring the live rate once known.
    pub fn remaining_ms(&self, now: Instant) -> Option<u64> {
        match (self.live_ms_per_row, self.total) {
            (Some(rate), Some(total)) => {
                let left = total.saturating_sub(self.processed);
                Some((left as f64 * rate).round() as u64)
            }
            _ => self
                .started_at
                .map(|_| self.estimated_ms.saturating_sub(self.elapsed_ms(now))),
        }
    }

    /// Close a successful run and return the new baseline.
    pub fn complete(&mut self, inserted: u64, updated: u64, now: Instant) -> f64 {
        let elapsed = self.elapsed_ms(now);
        let rows = (inserted + updated).max(1);
        self.ms_per_row = clamp_ms_per_row(elapsed as f64 / rows as f64);
        self.displayed = 100;
        debug!(elapsed_ms = elapsed, rows, ms_per_row = self.ms_per_row, "ETA baseline updated");
        self.ms_per_row
    }

    fn elapsed_ms(&self, now: Instant) -> u64 {
        self.started_at
            .map(|start| as_millis_u64(now.saturating_duration_since(start)))
            .unwrap_or(0)
    }

    fn local_percent(&self, now: Instant) -> u8 {
        if self.started_at.is_none() {
            return 0;
        }
        let ratio = self.elapsed_ms(now) as f64 / self.estimated_ms.max(1) as f64;
        ((ratio * 100.0) as u64).min(LOCAL_PROGRESS_CAP as u64) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp_ms_per_row(0.0), MIN_MS_PER_ROW);
        assert_eq!(clamp_ms_per_row(1e9), MAX_MS_PER_ROW);
        assert_eq!(clamp_ms_per_row(f64::INFINITY), MAX_MS_PER_ROW);
        assert_eq!(clamp_ms_per_row(f64::NAN), MIN_MS_PER_ROW);
        assert_eq!(clamp_ms_per_row(42.0), 42.0);
    }

    #[test]
    fn test_short_runs_get_minimum_duration() {
        let mut eta = EtaEstimator::new(20.0);
        eta.begin(Some(10), Instant::now());
        assert_eq!(eta.estimated_duration_ms(), MIN_ESTIMATED_DURATION_MS);

        eta.set_total(Some(1000));
        assert_eq!(eta.estimated_duration_ms(), 20_000);
    }

    #[test]
    fn test_local_ticks_stop_at_cap() {
        let start = Instant::now();
        let mut eta = EtaEstimator::new(10.0);
        eta.begin(Some(200), start);

        assert_eq!(eta.tick(start + Duration::from_millis(1000)), 50);
        assert_eq!(eta.tick(start + Duration::from_secs(60)), LOCAL_PROGRESS_CAP);
    }

    #[test]
    fn test_displayed_percent_never_regresses() {
        let start = Instant::now();
        let mut eta = EtaEstimator::new(10.0);
        eta.begin(Some(100), start);

        let local = eta.tick(start + Duration::from_millis(1200));
        assert_eq!(local, 80);

        // Server is behind the local clock; the display holds.
        let shown = eta.observe_progress(10, 100, start + Duration::from_millis(1300));
        assert!(shown >= 80);

        let later = eta.observe_progress(99, 100, start + Duration::from_millis(1400));
        assert_eq!(later, 99);
    }

    #[test]
    fn test_live_rate_drives_remaining_time() {
        let start = Instant::now();
        let mut eta = EtaEstimator::new(20.0);
        eta.begin(Some(100), start);

        eta.observe_progress(50, 100, start + Duration::from_millis(500));
        assert_eq!(eta.remaining_ms(start + Duration::from_millis(500)), Some(500));
    }

    #[test]
    fn test_complete_with_zero_elapsed_clamps() {
        let start = Instant::now();
        let mut eta = EtaEstimator::new(20.0);
        eta.begin(Some(1), start);
        assert_eq!(eta.complete(1, 0, start), MIN_MS_PER_ROW);
        assert_eq!(eta.percent(), 100);
    }

    #[test]
    fn test_complete_with_no_rows_clamps_high() {
        let start = Instant::now();
        let mut eta = EtaEstimator::new(20.0);
        eta.begin(Some(0), start);
        assert_eq!(
            eta.complete(0, 0, start + Duration::from_secs(5)),
            MAX_MS_PER_ROW
        );
    }

    #[test]
    fn test_complete_measures_rate() {
        let start = Instant::now();
        let mut eta = EtaEstimator::new(20.0);
        eta.begin(Some(100), start);
        assert_eq!(eta.complete(60, 40, start + Duration::from_millis(1200)), 12.0);
    }
}
