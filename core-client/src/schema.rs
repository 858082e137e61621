//! # Schema Inspector
//!
//! Fetches the column list of a destination table and never fails for
//! reasons other than being superseded.
//!
//! ## Retry policy
//!
//! 1. Request the schema with the first-attempt deadline (15s by default).
//! 2. On timeout, transport error or `success: false`, log one warning, wait
//!    the retry delay (500ms) and try once more with the longer deadline
//!    (25s).
//! 3. If that fails too, log a warning and use the hand-maintained fallback
//!    list for the table, which is never empty.
//!
//! Selecting another table while a request is in flight cancels it; the
//! superseded call returns [`ClientError::Cancelled`].

use crate::api::SyncApiClient;
use crate::error::{ClientError, Result};
use crate::slot::RequestSlot;
use bridge_traits::database::ColumnInfo;
use core_async::sync::CancellationToken;
use core_async::task::with_cancellation;
use core_async::time::{sleep, timeout};
use core_runtime::config::TimeoutConfig;
use core_sync::api::SchemaSource;
use core_sync::get_fallback_columns;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Columns of one table and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub source: SchemaSource,
}

impl TableSchema {
    pub fn is_fallback(&self) -> bool {
        self.source == SchemaSource::Fallback
    }
}

pub struct SchemaInspector {
    api: Arc<SyncApiClient>,
    timeouts: TimeoutConfig,
    slot: RequestSlot,
}

impl SchemaInspector {
    pub fn new(api: Arc<SyncApiClient>, timeouts: TimeoutConfig, root: &CancellationToken) -> Self {
        Self {
            api,
            timeouts,
            slot: RequestSlot::new(root),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_table_schema(&self, table: &str) -> Result<TableSchema> {
        let token = self.slot.begin().await;
        let outcome = with_cancellation(&token, self.fetch_with_retry(table)).await;
        self.slot.finish(&token).await;

        match outcome {
            Some(schema) => Ok(schema),
            None => {
                debug!("Schema request superseded");
                Err(ClientError::Cancelled)
            }
        }
    }

    pub async fn cancel(&self) {
        self.slot.cancel().await;
    }

    async fn fetch_with_retry(&self, table: &str) -> TableSchema {
        let first = self.attempt(table, self.timeouts.schema_first_attempt).await;
        let error = match first {
            Ok(schema) => return schema,
            Err(e) => e,
        };

        warn!(
            table,
            error = %error,
            retry_in_ms = self.timeouts.schema_retry_delay.as_millis() as u64,
            "Schema request failed, retrying once"
        );
        sleep(self.timeouts.schema_retry_delay).await;

        match self.attempt(table, self.timeouts.schema_retry_attempt).await {
            Ok(schema) => schema,
            Err(error) => {
                warn!(table, error = %error, "Schema unavailable, using fallback columns");
                TableSchema {
                    table: table.to_string(),
                    columns: get_fallback_columns(table),
                    source: SchemaSource::Fallback,
                }
            }
        }
    }

    async fn attempt(&self, table: &str, deadline: Duration) -> Result<TableSchema> {
        let data = match timeout(deadline, self.api.table_schema(table, deadline)).await {
            Ok(result) => result?,
            Err(_elapsed) => return Err(ClientError::timeout("table schema")),
        };

        if data.columns.is_empty() {
            return Err(ClientError::Decode(format!("no columns for {}", table)));
        }

        Ok(TableSchema {
            table: table.to_string(),
            columns: data.columns,
            source: data.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;
    use bridge_traits::error::BridgeError;

    const SCHEMA: &str = r#"{"success":true,"data":{"columns":[
        {"name":"reservation_no","type":"TEXT","primary_key":true},
        {"name":"name","type":"TEXT"}],"source":"database"}}"#;

    fn timeouts() -> TimeoutConfig {
        TimeoutConfig {
            schema_first_attempt: Duration::from_millis(100),
            schema_retry_delay: Duration::from_millis(10),
            schema_retry_attempt: Duration::from_millis(200),
            ..TimeoutConfig::default()
        }
    }

    fn inspector(http: ScriptedHttp) -> SchemaInspector {
        let api = Arc::new(SyncApiClient::new(Arc::new(http), "https://api.example.com"));
        SchemaInspector::new(api, timeouts(), &CancellationToken::new())
    }

    #[core_async::test]
    async fn test_first_attempt_success() {
        let schema = inspector(ScriptedHttp::new().respond(200, SCHEMA))
            .get_table_schema("reservations")
            .await
            .unwrap();
        assert_eq!(schema.columns.len(), 2);
        assert!(!schema.is_fallback());
    }

    #[core_async::test]
    async fn test_retry_after_unsuccessful_envelope() {
        let http = ScriptedHttp::new()
            .respond(200, r#"{"success":false,"message":"busy"}"#)
            .respond(200, SCHEMA);
        let schema = inspector(http)
            .get_table_schema("reservations")
            .await
            .unwrap();
        assert_eq!(schema.source, SchemaSource::Database);
    }

    #[core_async::test]
    async fn test_two_failures_fall_back() {
        let http = ScriptedHttp::new()
            .fail(BridgeError::Network("reset".into()))
            .respond_after(Duration::from_millis(400), 200, SCHEMA);
        let schema = inspector(http)
            .get_table_schema("reservations")
            .await
            .unwrap();

        assert!(schema.is_fallback());
        assert!(!schema.columns.is_empty());
    }

    #[core_async::test]
    async fn test_unknown_table_fallback_is_not_empty() {
        let http = ScriptedHttp::new()
            .fail(BridgeError::Network("reset".into()))
            .fail(BridgeError::Network("reset".into()));
        let schema = inspector(http).get_table_schema("audit_notes").await.unwrap();
        assert!(!schema.columns.is_empty());
    }

    #[core_async::test]
    async fn test_new_selection_cancels_previous() {
        let http = ScriptedHttp::new()
            .respond_after(Duration::from_millis(80), 200, SCHEMA)
            .respond(200, SCHEMA);
        let inspector = Arc::new(inspector(http));

        let first = {
            let inspector = inspector.clone();
            core_async::spawn(async move { inspector.get_table_schema("reservations").await })
        };
        sleep(Duration::from_millis(10)).await;
        let second = inspector.get_table_schema("products").await.unwrap();

        assert_eq!(first.await.unwrap(), Err(ClientError::Cancelled));
        assert_eq!(second.table, "products");
    }
}
