//! # Destination Store
//!
//! SQLite-backed destination for the sheet sync engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - Connection pooling with embedded migrations (`db`)
//! - [`SqliteTableStore`], the [`TableStore`](bridge_traits::TableStore)
//!   implementation the orchestrator writes through
//!
//! Tables are addressed by name at runtime, so every identifier is validated
//! against the live schema and quoted before it reaches SQL.

pub mod db;
pub mod error;
pub mod table_store;

pub use error::{Result, StoreError};
pub use table_store::SqliteTableStore;
