//! SQLite-backed [`SettingsStore`].
//!
//! One `settings` row per key. Every row records the kind of value it holds
//! so a column-mapping JSON blob is never read back as the ETA baseline.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        kind TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Number,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Text => "text",
            Kind::Number => "number",
        }
    }
}

fn db_error(action: &str, e: sqlx::Error) -> BridgeError {
    BridgeError::DatabaseError(format!("{}: {}", action, e))
}

pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (creating if needed) the settings database at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            db_path.to_string_lossy().replace('\\', "/")
        ))
        .map_err(|e| db_error("Invalid settings path", e))?
        .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| db_error("Failed to open settings database", e))?;

        let store = Self::with_pool(pool).await?;
        debug!(path = ?db_path, "Opened settings store");
        Ok(store)
    }

    /// A private in-memory database, pinned to one connection since every
    /// `sqlite::memory:` connection is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| db_error("Failed to open settings database", e))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| db_error("Failed to create settings table", e))?;
        Ok(Self { pool })
    }

    async fn write(&self, key: &str, value: &str, kind: Kind) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, kind, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                kind = excluded.kind,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(kind.as_str())
        .bind(core_async::time::now_millis() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to write setting", e))?;
        Ok(())
    }

    async fn read(&self, key: &str, kind: Kind) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value, kind FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to read setting", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let stored: String = row.get("kind");
        if stored != kind.as_str() {
            warn!(key, expected = kind.as_str(), stored = %stored, "Setting has a different kind");
            return Err(BridgeError::OperationFailed(format!(
                "Setting '{}' holds {}, not {}",
                key,
                stored,
                kind.as_str()
            )));
        }
        Ok(Some(row.get("value")))
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value, Kind::Text).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.read(key, Kind::Text).await
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(BridgeError::OperationFailed(format!(
                "Refusing to store non-finite value for '{}'",
                key
            )));
        }
        self.write(key, &value.to_string(), Kind::Number).await
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.read(key, Kind::Number)
            .await?
            .map(|raw| {
                raw.parse::<f64>().map_err(|e| {
                    BridgeError::OperationFailed(format!("Setting '{}' is not a number: {}", key, e))
                })
            })
            .transpose()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete setting", e))?;
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to look up setting", e))?;
        Ok(row.is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT key FROM settings WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list settings", e))?;

        Ok(rows.into_iter().map(|row| row.get("key")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mapping_blob_round_trip() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        let mapping = r#"{"name":"Name","tour_date":"Tour Date"}"#;
        store.set_string("column_mapping.tours", mapping).await.unwrap();
        assert_eq!(
            store.get_string("column_mapping.tours").await.unwrap().as_deref(),
            Some(mapping)
        );
        assert!(store.has_key("column_mapping.tours").await.unwrap());

        store.delete("column_mapping.tours").await.unwrap();
        assert_eq!(store.get_string("column_mapping.tours").await.unwrap(), None);
        assert!(!store.has_key("column_mapping.tours").await.unwrap());
    }

    #[tokio::test]
    async fn test_baseline_is_stored_as_number() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_f64("sync.eta.ms_per_row", 12.5).await.unwrap();
        store.set_f64("sync.eta.ms_per_row", 14.0).await.unwrap();
        assert_eq!(store.get_f64("sync.eta.ms_per_row").await.unwrap(), Some(14.0));

        assert!(store.get_string("sync.eta.ms_per_row").await.is_err());
        assert!(store.set_f64("sync.eta.ms_per_row", f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("column_mapping.tours", "{}").await.unwrap();
        store.set_string("column_mapping.reservations", "{}").await.unwrap();
        store.set_f64("sync.eta.ms_per_row", 20.0).await.unwrap();

        let keys = store.list_keys("column_mapping.").await.unwrap();
        assert_eq!(
            keys,
            vec!["column_mapping.reservations", "column_mapping.tours"]
        );
        assert_eq!(store.list_keys("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = std::env::temp_dir().join(format!("sheet-sync-settings-{}", std::process::id()));
        let path = dir.join("settings.db");

        {
            let store = SqliteSettingsStore::new(path.clone()).await.unwrap();
            store.set_f64("sync.eta.ms_per_row", 7.0).await.unwrap();
        }
        let reopened = SqliteSettingsStore::new(path).await.unwrap();
        assert_eq!(reopened.get_f64("sync.eta.ms_per_row").await.unwrap(), Some(7.0));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
