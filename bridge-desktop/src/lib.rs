//! # Desktop Bridge Implementations
//!
//! Default implementations of the host bridge traits for desktop and server
//! processes.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with streamed bodies for the chunked sync
//!   endpoint
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[core_async::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new();
//!     let settings = SqliteSettingsStore::new("sheet-sync/settings.db".into()).await?;
//!     // Inject both into CoreConfig
//!     Ok(())
//! }
//! ```

mod http;
mod settings;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
