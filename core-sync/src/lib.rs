//! # Sheet Sync Engine
//!
//! Applies Google Sheets rows to database tables.
//!
//! ## Overview
//!
//! This crate owns everything between a sheet and a table:
//! - Matching sheet headers to table columns (`mapping`)
//! - Coercing cell text into typed values (`record`)
//! - Running syncs and reporting progress (`orchestrator`)
//! - The NDJSON event protocol shared with clients (`event`, `wire`)
//! - Request and response bodies of the HTTP surface (`api`)
//! - Persisted run history (`job`, `repository`)
//!
//! ## Components
//!
//! - **Column Mapper** (`mapping`): Automatic header matching, mapping validation, fallback schemas
//! - **Row Projector** (`record`): Mapping-driven projection with per-cell type checks
//! - **Sync Orchestrator** (`orchestrator`): Streaming and single round-trip runs
//! - **Run State Machine** (`job`): Run lifecycle with validated transitions
//! - **Repository** (`repository`): SQLite persistence for sync runs

pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod job;
pub mod mapping;
pub mod messages;
pub mod orchestrator;
pub mod record;
pub mod repository;
pub mod wire;

pub use api::{ApiResponse, SyncRequest};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use event::{RealTimeStats, SyncDetails, SyncEvent, SyncResult};
pub use job::{RunStats, RunStatus, SyncMode, SyncRun, SyncRunId};
pub use mapping::{check_mapping, get_auto_mapping, get_fallback_columns, ColumnMapping, MappingReport};
pub use orchestrator::{SyncEventStream, SyncOrchestrator};
pub use record::{ProjectionError, RowProjector};
pub use repository::{SqliteSyncRunRepository, SyncRunRepository};
pub use wire::{encode_event, LineDecoder, NDJSON_CONTENT_TYPE};
