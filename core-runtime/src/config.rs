//! # Core Configuration Module
//!
//! Configuration for the sync client.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the injected bridges and the client's tunables. It
//! enforces fail-fast validation so a session is never created with a missing
//! capability or a nonsensical timeout.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Talks to the sync API (desktop default: reqwest)
//! - `SettingsStore` - Column mappings and the ETA baseline (desktop default:
//!   SQLite file next to `settings_path`)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! both are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://backoffice.example.com/api")
//!     .bearer_token(session_token)
//!     .sheet_name_prefix("S_")
//!     .settings_path("/home/ops/.sheet-sync/settings.db")
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing API base URL");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Client request deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Deadline for listing the sheets of a spreadsheet.
    pub list_sheets: Duration,
    /// Deadline for the first schema request.
    pub schema_first_attempt: Duration,
    /// Pause between the failed first schema request and the retry.
    pub schema_retry_delay: Duration,
    /// Deadline for the single schema retry.
    pub schema_retry_attempt: Duration,
    /// Deadline for every other buffered request.
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            list_sheets: Duration::from_secs(60),
            schema_first_attempt: Duration::from_secs(15),
            schema_retry_delay: Duration::from_millis(500),
            schema_retry_attempt: Duration::from_secs(25),
            request: Duration::from_secs(30),
        }
    }
}

/// Progress/ETA estimator tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaConfig {
    /// How often the locally ticking progress percentage advances.
    pub tick_interval: Duration,
    /// Baseline used until a successful run has been measured.
    pub default_ms_per_row: f64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            default_ms_per_row: 20.0,
        }
    }
}

/// Sync client configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL the `/sync/...` endpoints are resolved against
    pub api_base_url: String,

    /// Opaque session token sent as `Authorization: Bearer`
    pub bearer_token: Option<String>,

    /// HTTP client for the sync API (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Client-local persisted state (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Sheets whose name does not start with this prefix are not offered for sync
    pub sheet_name_prefix: Option<String>,

    pub timeouts: TimeoutConfig,

    pub eta: EtaConfig,

    /// Capacity of the session's event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("sheet_name_prefix", &self.sheet_name_prefix)
            .field("timeouts", &self.timeouts)
            .field("eta", &self.eta)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        if matches!(&self.bearer_token, Some(token) if token.trim().is_empty()) {
            return Err(Error::Config(
                "Bearer token is set but empty. Omit it instead.".to_string(),
            ));
        }

        let t = &self.timeouts;
        for (name, value) in [
            ("list_sheets", t.list_sheets),
            ("schema_first_attempt", t.schema_first_attempt),
            ("schema_retry_attempt", t.schema_retry_attempt),
            ("request", t.request),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("Timeout '{}' must be non-zero", name)));
            }
        }

        if self.eta.tick_interval.is_zero() {
            return Err(Error::Config("ETA tick interval must be non-zero".to_string()));
        }

        if !(self.eta.default_ms_per_row.is_finite() && self.eta.default_ms_per_row > 0.0) {
            return Err(Error::Config(
                "Default ms-per-row baseline must be a positive number".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the sync API. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Otherwise inject a host HTTP adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for column mappings and the ETA baseline. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Otherwise inject a host key-value store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(timeout));
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(settings_path: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use core_async::runtime::{Builder, Handle};
    use std::thread;

    let candidate = settings_path.cloned().ok_or_else(|| {
        Error::Config(
            "Settings path is required when no SettingsStore is injected. \
             Use .settings_path() to set it."
                .to_string(),
        )
    })?;

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // A runtime cannot be blocked on from inside another one.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(candidate))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(candidate)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(
    _settings_path: Option<&PathBuf>,
) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    bearer_token: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    sheet_name_prefix: Option<String>,
    timeouts: Option<TimeoutConfig>,
    eta: Option<EtaConfig>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the base URL of the sync API (required).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the opaque bearer token attached to authenticated endpoints.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the settings store implementation.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// File backing the default settings store (desktop only).
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Only sheets whose name starts with `prefix` are considered valid.
    pub fn sheet_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sheet_name_prefix = Some(prefix.into());
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn eta(mut self, eta: EtaConfig) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the base URL is missing, a required bridge is
    /// missing and no desktop default applies, or a value is invalid.
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let timeouts = self.timeouts.unwrap_or_default();

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(timeouts.request)?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path.as_ref())?,
        };

        let config = CoreConfig {
            api_base_url,
            bearer_token: self.bearer_token,
            http_client,
            settings_store,
            sheet_name_prefix: self.sheet_name_prefix.filter(|p| !p.is_empty()),
            timeouts,
            eta: self.eta.unwrap_or_default(),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
