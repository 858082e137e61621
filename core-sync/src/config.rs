//! Server-side sync tunables.

use std::collections::HashMap;

/// Configuration for [`SyncOrchestrator`](crate::SyncOrchestrator).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Rows between two `progress` events. The last row always reports.
    pub progress_interval: u64,

    /// Capacity of the event channel feeding a streaming response.
    pub event_buffer: usize,

    /// Natural key columns per destination table, overriding the table's
    /// primary key.
    pub natural_keys: HashMap<String, Vec<String>>,

    /// Data rows returned as `sampleData` by the sheet-columns endpoint.
    pub sample_rows: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            progress_interval: 10,
            event_buffer: 64,
            natural_keys: HashMap::new(),
            sample_rows: 5,
        }
    }
}

impl SyncConfig {
    pub fn with_progress_interval(mut self, rows: u64) -> Self {
        self.progress_interval = rows.max(1);
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn with_natural_key<I, S>(mut self, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.natural_keys
            .insert(table.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.progress_interval, 10);
        assert_eq!(config.sample_rows, 5);
        assert!(config.natural_keys.is_empty());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = SyncConfig::default()
            .with_progress_interval(0)
            .with_event_buffer(0);
        assert_eq!(config.progress_interval, 1);
        assert_eq!(config.event_buffer, 1);
    }

    #[test]
    fn test_natural_key_override() {
        let config = SyncConfig::default().with_natural_key("reservations", ["reservation_no"]);
        assert_eq!(
            config.natural_keys.get("reservations"),
            Some(&vec!["reservation_no".to_string()])
        );
    }
}
