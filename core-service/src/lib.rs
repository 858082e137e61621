//! Server façade and bootstrap helpers.
//!
//! This crate wires the sheet source, destination store and run history into
//! a [`SyncService`] whose handlers back the `/sync/...` HTTP endpoints.
//! Desktop and server hosts typically enable the `desktop-shims` feature and
//! call [`bootstrap_sqlite`], which builds every collaborator from a database
//! path and a Google access token.

pub mod config;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use service::{
    ApiReply, CleanupStatusProvider, NdjsonStream, Reply, StreamReply, SyncService,
};

use std::sync::Arc;

use bridge_traits::{SheetSource, TableStore};
use core_sync::SyncRunRepository;

/// Aggregated handle to everything the service talks to.
pub struct CoreDependencies {
    pub sheet_source: Arc<dyn SheetSource>,
    pub table_store: Arc<dyn TableStore>,
    pub run_history: Arc<dyn SyncRunRepository>,
    pub cleanup: Option<Arc<dyn CleanupStatusProvider>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit handles.
    pub fn new(
        sheet_source: Arc<dyn SheetSource>,
        table_store: Arc<dyn TableStore>,
        run_history: Arc<dyn SyncRunRepository>,
    ) -> Self {
        Self {
            sheet_source,
            table_store,
            run_history,
            cleanup: None,
        }
    }

    pub fn with_cleanup(mut self, provider: Arc<dyn CleanupStatusProvider>) -> Self {
        self.cleanup = Some(provider);
        self
    }
}

/// Build a service over a SQLite database and the Google Sheets API.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_sqlite, ServiceConfig};
///
/// let config = ServiceConfig::new()
///     .allow_tables(["reservations", "products"])
///     .api_token("ops-console-token");
/// let service = bootstrap_sqlite(config, "/var/lib/backoffice/data.db", "ya29.token").await?;
/// let tables = service.all_tables().await;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_sqlite(
    config: ServiceConfig,
    database_path: impl Into<std::path::PathBuf>,
    google_access_token: impl Into<String>,
) -> Result<SyncService> {
    use bridge_desktop::ReqwestHttpClient;
    use core_store::db::{create_pool, DatabaseConfig};
    use core_store::SqliteTableStore;
    use core_sync::SqliteSyncRunRepository;
    use provider_google_sheets::GoogleSheetsConnector;

    let pool = create_pool(DatabaseConfig::new(database_path))
        .await
        .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;

    let http = Arc::new(ReqwestHttpClient::new());
    let sheets = GoogleSheetsConnector::new(http, google_access_token.into());
    let store = SqliteTableStore::new(pool.clone())
        .with_allowed_tables(config.allowed_tables.iter().cloned());
    let history = SqliteSyncRunRepository::new(pool);

    let deps = CoreDependencies::new(Arc::new(sheets), Arc::new(store), Arc::new(history));
    SyncService::new(deps, config)
}
