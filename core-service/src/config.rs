//! Server-side configuration.

use crate::error::{Result, ServiceError};
use core_sync::SyncConfig;
use std::collections::BTreeSet;
use std::fmt;

/// Which tables may be synced and who may run syncs.
#[derive(Clone, Default)]
pub struct ServiceConfig {
    /// Tables offered by `GET /sync/all-tables`; every other endpoint rejects
    /// the rest.
    pub allowed_tables: BTreeSet<String>,
    /// Bearer tokens accepted by the sync endpoints.
    pub api_tokens: Vec<String>,
    pub sync: SyncConfig,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("allowed_tables", &self.allowed_tables)
            .field("api_tokens", &format_args!("[{} redacted]", self.api_tokens.len()))
            .field("sync", &self.sync)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_table(mut self, table: impl Into<String>) -> Self {
        self.allowed_tables.insert(table.into());
        self
    }

    pub fn allow_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_tokens.push(token.into());
        self
    }

    pub fn sync_config(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn is_table_allowed(&self, table: &str) -> bool {
        self.allowed_tables.contains(table)
    }

    /// Fails when nothing could ever be synced or nobody could run a sync.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_tables.is_empty() {
            return Err(ServiceError::InitializationFailed(
                "at least one table must be allowed".to_string(),
            ));
        }
        if self.api_tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(ServiceError::InitializationFailed(
                "at least one API token is required".to_string(),
            ));
        }
        if self.sync.event_buffer == 0 {
            return Err(ServiceError::InitializationFailed(
                "event buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
