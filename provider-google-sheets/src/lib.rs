//! # Google Sheets Provider
//!
//! Implements the `SheetSource` trait for the Google Sheets API v4.
//!
//! ## Overview
//!
//! This module provides:
//! - Sheet (tab) listing with grid dimensions and visibility
//! - Header and row reads over the `values` endpoint
//! - Rate limiting and exponential backoff
//! - Failure classification into quota, permission, not-found and network

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleSheetsConnector;
pub use error::{GoogleSheetsError, Result};
