//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the sheet sync workspace:
//! - Logging and tracing infrastructure
//! - Client configuration
//! - Event bus system

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
