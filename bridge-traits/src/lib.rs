//! # Host Bridge Traits
//!
//! Capability contracts between the sync core and the outside world.
//!
//! ## Overview
//!
//! The core never talks to a network stack, a spreadsheet API or a database
//! driver directly. Each of those is a trait here, implemented by an adapter
//! crate (`bridge-desktop`, `provider-google-sheets`, `core-store`) and
//! injected at construction time.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry and streamed bodies
//!
//! ### Data
//! - [`SheetSource`](sheets::SheetSource) - Spreadsheet tabs and cell values
//! - [`TableStore`](database::TableStore) - Destination table introspection and writes
//! - [`SettingsStore`](storage::SettingsStore) - Client-local key-value preferences
//!
//! ### Diagnostics
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Consumers fail fast with a descriptive error when a required capability
//! was not injected:
//!
//! ```ignore
//! let settings = config.settings_store.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "SettingsStore".to_string(),
//!     message: "No settings store provided".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters convert
//! their native errors into the closest variant so callers can tell a
//! permission problem from a quota problem from a flaky network.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across spawned sync tasks behind an `Arc`.

pub mod database;
pub mod error;
pub mod http;
pub mod logging;
pub mod sheets;
pub mod storage;

pub use error::BridgeError;

pub use database::{
    BatchOutcome, ColumnInfo, FieldValue, RowFailure, RowOutcome, TableRecord, TableStore,
};
pub use http::{
    ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
    RetryPolicy,
};
pub use sheets::{SheetSource, SheetSummary, SheetValues};
pub use storage::SettingsStore;
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
