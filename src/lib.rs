//! Workspace façade crate.
//!
//! Re-exports the server façade (`desktop-shims`) and the browser-side
//! client (`client`) so hosts can depend on `sheet-sync` and pick features
//! instead of wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "client")]
pub use core_client as client;
