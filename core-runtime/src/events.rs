//! # Event Bus System
//!
//! Event-driven notifications for UI bindings, built on a broadcast channel.
//! The sync session publishes what it is doing here; any number of
//! subscribers (a progress bar, a log panel, a status line) listen
//! independently.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Sync Session ├──────────────>│ EventBus  ├─────────────────>│ Progress UI│
//! └──────────────┘               │ (broadcast│                  └────────────┘
//!                                │  channel) │     subscribe    ┌────────────┐
//!                                │           ├─────────────────>│ Log panel  │
//!                                └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Catalog(CatalogEvent::TablesLoaded { count: 12 }))
//!     .ok();
//! ```
//!
//! ## Event Types
//!
//! ### Catalog Events
//! - `SheetsLoaded`: valid sheets of a spreadsheet were listed
//! - `NoValidSheets`: the spreadsheet has no sheet following the naming convention
//! - `SheetColumnsLoaded`: header and sample rows of a sheet were read
//! - `TablesLoaded`: destination tables were enumerated
//! - `TableSchemaLoaded`: destination columns are known (possibly from the fallback list)
//! - `MappingChanged`: the column mapping of a table was derived, loaded or edited
//!
//! ### Sync Run Events
//! - `Started`, `Progress`, `Log`, `Completed`, `Failed`, `Cancelled`

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Progress ticks arrive every 200ms during a run; subscribers that fall
/// further behind than this receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sheets, tables, schemas and mappings
    Catalog(CatalogEvent),
    /// One sync run from start to terminal state
    Sync(SyncRunEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Catalog(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncRunEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncRunEvent::Log { level, .. }) => *level,
            CoreEvent::Catalog(CatalogEvent::TableSchemaLoaded { fallback: true, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncRunEvent::Completed { .. })
            | CoreEvent::Sync(SyncRunEvent::Cancelled { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Events describing what the session learned about source and destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    SheetsLoaded {
        spreadsheet_id: String,
        sheet_names: Vec<String>,
    },
    /// Listing succeeded but no sheet follows the naming convention.
    NoValidSheets { spreadsheet_id: String },
    SheetColumnsLoaded {
        sheet_name: String,
        columns: Vec<String>,
    },
    TablesLoaded { count: usize },
    TableSchemaLoaded {
        table: String,
        column_count: usize,
        /// The schema request failed twice and the static column list is in use.
        fallback: bool,
    },
    MappingChanged {
        table: String,
        mapped_columns: usize,
        /// "auto", "stored" or "edited"
        origin: String,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::SheetsLoaded { .. } => "Sheets loaded",
            CatalogEvent::NoValidSheets { .. } => "No valid sheets found",
            CatalogEvent::SheetColumnsLoaded { .. } => "Sheet columns loaded",
            CatalogEvent::TablesLoaded { .. } => "Tables loaded",
            CatalogEvent::TableSchemaLoaded { fallback: false, .. } => "Table schema loaded",
            CatalogEvent::TableSchemaLoaded { fallback: true, .. } => {
                "Table schema unavailable, using fallback columns"
            }
            CatalogEvent::MappingChanged { .. } => "Column mapping changed",
        }
    }
}

// ============================================================================
// Sync Run Events
// ============================================================================

/// Events describing one sync run as seen by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncRunEvent {
    Started {
        run_id: String,
        table: String,
        /// Row count known before the server reported one.
        estimated_rows: Option<u64>,
        /// Locally projected duration from the persisted ms-per-row baseline.
        estimated_duration_ms: u64,
    },
    /// Emitted on every local tick and on every server progress event.
    Progress {
        run_id: String,
        processed: u64,
        inserted: u64,
        updated: u64,
        errors: u64,
        total: Option<u64>,
        /// Displayed percentage (0-100); never decreases within a run.
        percent: u8,
        /// Projected remaining time, once it can be computed.
        eta_ms: Option<u64>,
    },
    /// A diagnostic line streamed by the server.
    Log {
        run_id: String,
        level: EventSeverity,
        message: String,
    },
    Completed {
        run_id: String,
        message: String,
        inserted: u64,
        updated: u64,
        errors: u64,
        duration_ms: u64,
    },
    Failed { run_id: String, message: String },
    Cancelled { run_id: String, processed: u64 },
}

impl SyncRunEvent {
    fn description(&self) -> &str {
        match self {
            SyncRunEvent::Started { .. } => "Sync started",
            SyncRunEvent::Progress { .. } => "Sync in progress",
            SyncRunEvent::Log { .. } => "Sync log",
            SyncRunEvent::Completed { .. } => "Sync completed",
            SyncRunEvent::Failed { .. } => "Sync failed",
            SyncRunEvent::Cancelled { .. } => "Sync cancelled",
        }
    }

    /// Identifier of the run this event belongs to.
    pub fn run_id(&self) -> &str {
        match self {
            SyncRunEvent::Started { run_id, .. }
            | SyncRunEvent::Progress { run_id, .. }
            | SyncRunEvent::Log { run_id, .. }
            | SyncRunEvent::Completed { run_id, .. }
            | SyncRunEvent::Failed { run_id, .. }
            | SyncRunEvent::Cancelled { run_id, .. } => run_id,
        }
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncRunEvent::Completed { .. }
                | SyncRunEvent::Failed { .. }
                | SyncRunEvent::Cancelled { .. }
        )
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::default();
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
    ///
    /// let event_bus = EventBus::new(100);
    /// let event = CoreEvent::Catalog(CatalogEvent::TablesLoaded { count: 3 });
    ///
    /// match event_bus.emit(event) {
    ///     Ok(n) => println!("Event sent to {} subscribers", n),
    ///     Err(_) => println!("No active subscribers"),
    /// }
    /// ```
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use core_runtime::events::EventBus;
    ///
    /// # async fn example() {
    /// let event_bus = EventBus::new(100);
    /// let mut subscriber = event_bus.subscribe();
    ///
    /// core_async::task::spawn(async move {
    ///     while let Ok(event) = subscriber.recv().await {
    ///         println!("Received: {:?}", event);
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// This provides a more ergonomic API for consuming events with optional filtering
/// by event type or severity.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe());
///
/// let sync_only = stream.filter(|event| matches!(event, CoreEvent::Sync(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::{EventBus, EventStream, CoreEvent, EventSeverity};
    ///
    /// let event_bus = EventBus::new(100);
    /// let stream = EventStream::new(event_bus.subscribe());
    ///
    /// let problems = stream.filter(|event| event.severity() >= EventSeverity::Warning);
    /// ```
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// This will skip events that don't match the filter and return the next matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            // If no filter, return immediately
            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            // Apply filter
            if filter(&event) {
                return Ok(event);
            }

            // Event didn't match filter, continue to next event
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    // If no filter, return immediately
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    // Apply filter
                    if filter(&event) {
                        return Some(Ok(event));
                    }

                    // Event didn't match filter, continue
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(run_id: &str, processed: u64, percent: u8) -> CoreEvent {
        CoreEvent::Sync(SyncRunEvent::Progress {
            run_id: run_id.to_string(),
            processed,
            inserted: processed,
            updated: 0,
            errors: 0,
            total: Some(100),
            percent,
            eta_ms: None,
        })
    }

    #[core_async::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[core_async::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Catalog(CatalogEvent::TablesLoaded { count: 1 });

        assert!(bus.emit(event).is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncRunEvent::Started {
            run_id: "run-1".to_string(),
            table: "reservations".to_string(),
            estimated_rows: Some(250),
            estimated_duration_ms: 5000,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Sync(e) if e.is_terminal()));

        bus.emit(progress("run-1", 10, 10)).ok();
        let completed = CoreEvent::Sync(SyncRunEvent::Completed {
            run_id: "run-1".to_string(),
            message: "done".to_string(),
            inserted: 98,
            updated: 0,
            errors: 2,
            duration_ms: 1200,
        });
        bus.emit(completed.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), completed);
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(progress("run-1", i * 10, (i * 10) as u8)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncRunEvent::Failed {
            run_id: "run-1".to_string(),
            message: "truncate failed".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let fallback = CoreEvent::Catalog(CatalogEvent::TableSchemaLoaded {
            table: "reservations".to_string(),
            column_count: 12,
            fallback: true,
        });
        assert_eq!(fallback.severity(), EventSeverity::Warning);

        let log = CoreEvent::Sync(SyncRunEvent::Log {
            run_id: "run-1".to_string(),
            level: EventSeverity::Error,
            message: "row 10: UNIQUE constraint failed".to_string(),
        });
        assert_eq!(log.severity(), EventSeverity::Error);

        assert_eq!(progress("run-1", 1, 1).severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::Catalog(CatalogEvent::TableSchemaLoaded {
            table: "tours".to_string(),
            column_count: 5,
            fallback: true,
        });
        assert_eq!(
            event.description(),
            "Table schema unavailable, using fallback columns"
        );
    }

    #[test]
    fn test_run_id_and_terminal() {
        let cancelled = SyncRunEvent::Cancelled {
            run_id: "run-7".to_string(),
            processed: 40,
        };
        assert_eq!(cancelled.run_id(), "run-7");
        assert!(cancelled.is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = progress("run-123", 50, 50);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("run-123"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[core_async::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        let event = CoreEvent::Catalog(CatalogEvent::NoValidSheets {
            spreadsheet_id: "sheet-1".to_string(),
        });
        bus.emit(event.clone()).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, event);
    }
}
