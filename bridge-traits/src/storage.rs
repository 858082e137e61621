//! Client-local persisted state.
//!
//! The sync client keeps two kinds of state between sessions: the column
//! mapping chosen for each destination table and the ETA baseline. Both live
//! behind [`SettingsStore`], injected into the session object.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts the host's preferences storage (a SQLite file on desktop,
/// an in-memory map in tests).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_baseline(store: &dyn SettingsStore) -> Result<()> {
///     store.set_f64("sync.eta.ms_per_row", 12.5).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// `Ok(None)` when the key is absent. A key holding a number is an error.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    /// `Ok(None)` when the key is absent. A key holding text is an error.
    async fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool>;

    /// Keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}
