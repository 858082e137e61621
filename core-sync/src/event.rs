//! # Sync Event Model
//!
//! Typed events a streaming sync run produces, in wire order:
//!
//! ```text
//! (info|warn|error)* start (progress|info|warn|error)* result
//! ```
//!
//! `start` comes exactly once before any `progress`; `result` comes exactly
//! once and nothing follows it. Log events never touch the counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event of a streaming sync run.
///
/// Serialized with an internal `type` tag:
/// `{"type":"progress","processed":10,"inserted":8,"updated":2,"errors":0,"total":100}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncEvent {
    Start {
        total: u64,
    },
    Progress {
        processed: u64,
        inserted: u64,
        updated: u64,
        errors: u64,
        total: u64,
    },
    Info {
        message: String,
    },
    Warn {
        message: String,
    },
    Error {
        message: String,
        /// Sheet row number (header is row 1) when the error concerns a row.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        row: Option<u64>,
    },
    Result(SyncResult),
}

impl SyncEvent {
    pub fn info(message: impl Into<String>) -> Self {
        SyncEvent::Info {
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        SyncEvent::Warn {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SyncEvent::Error {
            message: message.into(),
            row: None,
        }
    }

    pub fn row_error(row: u64, message: impl Into<String>) -> Self {
        SyncEvent::Error {
            message: message.into(),
            row: Some(row),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncEvent::Result(_))
    }

    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Start { .. } => "start",
            SyncEvent::Progress { .. } => "progress",
            SyncEvent::Info { .. } => "info",
            SyncEvent::Warn { .. } => "warn",
            SyncEvent::Error { .. } => "error",
            SyncEvent::Result(_) => "result",
        }
    }
}

/// Aggregate counters of a finished (or aborted) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDetails {
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub duration_ms: u64,
    /// Whether the destination table was cleared first.
    #[serde(default)]
    pub truncated: bool,
}

/// Terminal outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "details", skip_serializing_if = "Option::is_none")]
    pub data: Option<SyncDetails>,
    /// Rows processed, reported by the optimized path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_time: Option<DateTime<Utc>>,
}

impl SyncResult {
    pub fn completed(message: impl Into<String>, details: SyncDetails) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(details),
            count: None,
            sync_time: Some(Utc::now()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            count: None,
            sync_time: None,
        }
    }

    pub fn with_details(mut self, details: SyncDetails) -> Self {
        self.data = Some(details);
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn errors(&self) -> u64 {
        self.data.map_or(0, |d| d.errors)
    }
}

/// Live counters of the current run, fed by `progress` events.
///
/// Counters never decrease within a run; [`RealTimeStats::reset`] starts a
/// new run from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeStats {
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
}

impl RealTimeStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold in a `progress` event. Returns false for any other event.
    pub fn absorb(&mut self, event: &SyncEvent) -> bool {
        match event {
            SyncEvent::Progress {
                processed,
                inserted,
                updated,
                errors,
                ..
            } => {
                self.processed = self.processed.max(*processed);
                self.inserted = self.inserted.max(*inserted);
                self.updated = self.updated.max(*updated);
                self.errors = self.errors.max(*errors);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_wire_shape() {
        let event = SyncEvent::Progress {
            processed: 10,
            inserted: 8,
            updated: 1,
            errors: 1,
            total: 100,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["processed"], 10);
        assert_eq!(json["total"], 100);
    }

    #[test]
    fn test_result_wire_shape() {
        let details = SyncDetails {
            inserted: 90,
            updated: 8,
            errors: 2,
            processed: 100,
            total: 100,
            duration_ms: 1234,
            truncated: false,
        };
        let event = SyncEvent::Result(SyncResult::completed("done", details));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "result");
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["durationMs"], 1234);
        assert!(json.get("count").is_none());
        assert!(json["syncTime"].is_string());
    }

    #[test]
    fn test_result_accepts_details_alias() {
        let json = r#"{"type":"result","success":false,"message":"x","details":{"inserted":1,"updated":0,"errors":3}}"#;
        let event: SyncEvent = serde_json::from_str(json).unwrap();
        match event {
            SyncEvent::Result(result) => {
                assert!(!result.success);
                assert_eq!(result.errors(), 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_row_error_omits_missing_row() {
        let json = serde_json::to_string(&SyncEvent::error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"boom"}"#);

        let json = serde_json::to_string(&SyncEvent::row_error(12, "boom")).unwrap();
        assert!(json.contains(r#""row":12"#));
    }

    #[test]
    fn test_real_time_stats_never_decrease() {
        let mut stats = RealTimeStats::default();
        let progress = |processed, inserted| SyncEvent::Progress {
            processed,
            inserted,
            updated: 0,
            errors: 0,
            total: 50,
        };

        assert!(stats.absorb(&progress(20, 18)));
        assert!(stats.absorb(&progress(10, 9)));
        assert_eq!(stats.processed, 20);
        assert_eq!(stats.inserted, 18);

        assert!(!stats.absorb(&SyncEvent::info("hello")));

        stats.reset();
        assert_eq!(stats, RealTimeStats::default());
    }

    #[test]
    fn test_kind_matches_tag() {
        let events = vec![
            SyncEvent::Start { total: 1 },
            SyncEvent::info("a"),
            SyncEvent::warn("b"),
            SyncEvent::error("c"),
            SyncEvent::Result(SyncResult::failure("d")),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }
}
