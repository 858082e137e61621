//! # Sync Client
//!
//! Client side of the sheet sync tool.
//!
//! ## Overview
//!
//! A [`SyncSession`] walks an operator from spreadsheet to finished sync:
//! - List the sheets of a spreadsheet and load a sheet's header (`sheet_reader`)
//! - Load a table's columns, falling back to a static list (`schema`)
//! - Propose and persist a column mapping (`mapping_store`)
//! - Stream a sync run, tracking counters and ETA (`stream`, `eta`)
//!
//! Everything the session learns is published as
//! [`CoreEvent`](core_runtime::events::CoreEvent)s for UI bindings.
//!
//! ## Usage
//!
//! ```ignore
//! use core_client::SyncSession;
//! use core_runtime::config::CoreConfig;
//!
//! let session = SyncSession::new(CoreConfig::builder()
//!     .api_base_url("https://backoffice.example.com/api")
//!     .bearer_token(token)
//!     .build()?);
//!
//! let sheets = session.list_sheets(spreadsheet_id).await?;
//! let columns = session.load_sheet_columns(spreadsheet_id, "S_예약").await?;
//! let selection = session.select_table("reservations", &columns.columns).await?;
//! let result = session
//!     .run_sync(SyncRequest::new(spreadsheet_id, "S_예약", "reservations", selection.mapping), None)
//!     .await;
//! ```

pub mod api;
pub mod error;
pub mod eta;
pub mod mapping_store;
pub mod messages;
pub mod schema;
pub mod session;
pub mod sheet_reader;
pub mod slot;
pub mod stream;

#[cfg(test)]
mod testing;

pub use api::SyncApiClient;
pub use error::{ClientError, Result};
pub use eta::EtaEstimator;
pub use mapping_store::MappingStore;
pub use schema::{SchemaInspector, TableSchema};
pub use session::{MappingOrigin, SyncSession, TableSelection};
pub use sheet_reader::{SheetListing, SheetReader};
pub use slot::RequestSlot;
pub use stream::StreamConsumer;
