//! Column mappings persisted per table name.

use crate::error::{ClientError, Result};
use bridge_traits::SettingsStore;
use core_sync::ColumnMapping;
use std::sync::Arc;
use tracing::warn;

const KEY_PREFIX: &str = "column_mapping.";

pub struct MappingStore {
    store: Arc<dyn SettingsStore>,
}

impl MappingStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    fn key(table: &str) -> String {
        format!("{}{}", KEY_PREFIX, table)
    }

    /// The stored mapping for `table`; unreadable entries count as absent.
    pub async fn load(&self, table: &str) -> Option<ColumnMapping> {
        let raw = match self.store.get_string(&Self::key(table)).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(table, error = %e, "Failed to read stored column mapping");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                warn!(table, error = %e, "Ignoring malformed stored column mapping");
                None
            }
        }
    }

    pub async fn save(&self, table: &str, mapping: &ColumnMapping) -> Result<()> {
        let raw =
            serde_json::to_string(mapping).map_err(|e| ClientError::Settings(e.to_string()))?;
        self.store
            .set_string(&Self::key(table), &raw)
            .await
            .map_err(|e| ClientError::Settings(e.to_string()))
    }

    pub async fn clear(&self, table: &str) -> Result<()> {
        self.store
            .delete(&Self::key(table))
            .await
            .map_err(|e| ClientError::Settings(e.to_string()))
    }

    /// Tables that have a stored mapping.
    pub async fn tables(&self) -> Result<Vec<String>> {
        let keys = self
            .store
            .list_keys(KEY_PREFIX)
            .await
            .map_err(|e| ClientError::Settings(e.to_string()))?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;

    async fn store() -> MappingStore {
        MappingStore::new(Arc::new(SqliteSettingsStore::in_memory().await.unwrap()))
    }

    fn mapping() -> ColumnMapping {
        [("name", "이름"), ("tour_date", "투어 날짜")]
            .into_iter()
            .map(|(d, s)| (d.to_string(), s.to_string()))
            .collect()
    }

    #[core_async::test]
    async fn test_roundtrip_per_table() {
        let mappings = store().await;
        mappings.save("reservations", &mapping()).await.unwrap();

        assert_eq!(mappings.load("reservations").await, Some(mapping()));
        assert_eq!(mappings.load("products").await, None);
        assert_eq!(mappings.tables().await.unwrap(), vec!["reservations".to_string()]);
    }

    #[core_async::test]
    async fn test_malformed_entry_is_ignored() {
        let settings = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
        settings
            .set_string("column_mapping.products", "{not json")
            .await
            .unwrap();

        let mappings = MappingStore::new(settings);
        assert_eq!(mappings.load("products").await, None);
    }

    #[core_async::test]
    async fn test_clear_removes_mapping() {
        let mappings = store().await;
        mappings.save("reservations", &mapping()).await.unwrap();
        mappings.clear("reservations").await.unwrap();
        assert_eq!(mappings.load("reservations").await, None);
    }
}
