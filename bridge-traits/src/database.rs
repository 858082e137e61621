//! Destination table store abstraction.
//!
//! The sync engine writes projected sheet rows into a relational table it
//! does not own. This trait captures exactly the operations the engine
//! needs: schema introspection, truncation and natural-key upserts.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::database::{FieldValue, TableRecord, TableStore};
//!
//! let mut record = TableRecord::new();
//! record.insert("name".into(), FieldValue::Text("Jeju Day Tour".into()));
//! let outcome = store.upsert("tours", &["name".to_string()], &record).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

// =============================================================================
// Schema Types
// =============================================================================

/// One destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type, as written in the table definition.
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            default_value: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

// =============================================================================
// Record Types
// =============================================================================

/// A typed cell value bound into a destination statement.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

/// Destination column name to value, ordered by column name so generated
/// statements are stable.
pub type TableRecord = BTreeMap<String, FieldValue>;

/// What a single upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
}

/// A row that could not be written during a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub message: String,
}

/// Aggregate outcome of [`TableStore::apply_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub failures: Vec<RowFailure>,
}

impl BatchOutcome {
    pub fn processed(&self) -> u64 {
        self.inserted + self.updated + self.failures.len() as u64
    }
}

// =============================================================================
// Table Store Trait
// =============================================================================

/// Destination store the sync engine writes into.
///
/// ## Error Handling
///
/// Row-level failures (constraint violations, type errors) are returned as
/// [`BridgeError::DatabaseError`](crate::BridgeError::DatabaseError) from
/// [`upsert`](TableStore::upsert) so the caller can count them and continue.
/// [`apply_batch`](TableStore::apply_batch) collects them in
/// [`BatchOutcome::failures`] instead and only fails as a whole when the
/// store itself is unusable.
///
/// An unusable store (closed or exhausted pool, I/O failure, locked or
/// corrupt database) is reported as `NotAvailable` or `Io`, and a table that
/// disappeared as `NotFound`. Callers must end the run on those.
///
/// ## Concurrency
///
/// No application-level locking is performed. Concurrent writers against the
/// same table race; the last write per natural key wins.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Tables the store exposes to the sync engine.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column metadata for `table`, in declaration order.
    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Delete every row of `table`, returning how many were removed.
    async fn truncate(&self, table: &str) -> Result<u64>;

    /// Insert `record`, or update the existing row whose `key_columns` match.
    ///
    /// An empty `key_columns` slice always inserts.
    async fn upsert(
        &self,
        table: &str,
        key_columns: &[String],
        record: &TableRecord,
    ) -> Result<RowOutcome>;

    /// Apply many upserts in one round trip.
    async fn apply_batch(
        &self,
        table: &str,
        key_columns: &[String],
        records: &[TableRecord],
    ) -> Result<BatchOutcome>;
}
