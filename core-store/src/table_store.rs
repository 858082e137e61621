//! SQLite implementation of [`TableStore`].

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use bridge_traits::database::{
    BatchOutcome, ColumnInfo, FieldValue, RowFailure, RowOutcome, TableRecord, TableStore,
};
use bridge_traits::error::Result as BridgeResult;
use core_async::sync::RwLock;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Tables the store itself owns; never offered as sync targets.
const INTERNAL_TABLES: &[&str] = &["_sqlx_migrations", "sync_runs"];

/// Destination tables in a SQLite database.
///
/// Without an allow-list every user table is exposed. With one, only the
/// intersection of the allow-list and the live schema is.
///
/// A table found in the schema once is remembered, so per-row writes skip the
/// catalog lookup. A table dropped afterwards surfaces as `NotFound` from the
/// write itself.
#[derive(Clone)]
pub struct SqliteTableStore {
    pool: SqlitePool,
    allowed_tables: Option<HashSet<String>>,
    verified: Arc<RwLock<HashSet<String>>>,
}

impl SqliteTableStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            allowed_tables: None,
            verified: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            if INTERNAL_TABLES.contains(&name.as_str()) {
                continue;
            }
            if let Some(allowed) = &self.allowed_tables {
                if !allowed.contains(&name) {
                    continue;
                }
            }
            tables.push(name);
        }
        Ok(tables)
    }

    async fn ensure_table(&self, table: &str) -> Result<()> {
        validate_identifier(table)?;
        if self.verified.read().await.contains(table) {
            return Ok(());
        }
        if self.tables().await?.iter().any(|t| t == table) {
            self.verified.write().await.insert(table.to_string());
            Ok(())
        } else {
            Err(StoreError::UnknownTable(table.to_string()))
        }
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(table)))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo> {
                let name: String = row.try_get("name")?;
                let data_type: String = row.try_get("type")?;
                let not_null: i64 = row.try_get("notnull")?;
                let default_value: Option<String> = row.try_get("dflt_value")?;
                let pk: i64 = row.try_get("pk")?;

                Ok(ColumnInfo {
                    name,
                    data_type,
                    nullable: not_null == 0 && pk == 0,
                    primary_key: pk > 0,
                    default_value,
                })
            })
            .collect()
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    #[instrument(skip(self))]
    async fn list_tables(&self) -> BridgeResult<Vec<String>> {
        Ok(self.tables().await?)
    }

    #[instrument(skip(self))]
    async fn table_columns(&self, table: &str) -> BridgeResult<Vec<ColumnInfo>> {
        self.ensure_table(table).await?;
        let columns = self.columns(table).await?;
        debug!(table, columns = columns.len(), "Loaded table schema");
        Ok(columns)
    }

    #[instrument(skip(self))]
    async fn truncate(&self, table: &str) -> BridgeResult<u64> {
        self.ensure_table(table).await?;
        let result = sqlx::query(&format!("DELETE FROM {}", quote_identifier(table)))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(table, error = %e, "Truncate failed");
                StoreError::Database(e)
            })?;
        Ok(result.rows_affected())
    }

    async fn upsert(
        &self,
        table: &str,
        key_columns: &[String],
        record: &TableRecord,
    ) -> BridgeResult<RowOutcome> {
        self.ensure_table(table).await?;
        validate_record(key_columns, record)?;

        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let outcome = upsert_on(&mut *conn, table, key_columns, record)
            .await
            .map_err(StoreError::from)?;
        Ok(outcome)
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn apply_batch(
        &self,
        table: &str,
        key_columns: &[String],
        records: &[TableRecord],
    ) -> BridgeResult<BatchOutcome> {
        self.ensure_table(table).await?;

        let mut outcome = BatchOutcome::default();
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        // A failed statement only rolls back itself in SQLite, so the rest of
        // the batch still commits.
        for (index, record) in records.iter().enumerate() {
            let result = match validate_record(key_columns, record) {
                Ok(()) => upsert_on(&mut *tx, table, key_columns, record)
                    .await
                    .map_err(StoreError::from),
                Err(e) => Err(e),
            };

            match result {
                Ok(RowOutcome::Inserted) => outcome.inserted += 1,
                Ok(RowOutcome::Updated) => outcome.updated += 1,
                Err(e) if !e.is_row_level() => {
                    warn!(table, index, error = %e, "Batch aborted");
                    return Err(e.into());
                }
                Err(e) => outcome.failures.push(RowFailure {
                    index,
                    message: e.row_message(),
                }),
            }
        }

        tx.commit().await.map_err(StoreError::from)?;

        debug!(
            table,
            inserted = outcome.inserted,
            updated = outcome.updated,
            failed = outcome.failures.len(),
            "Batch applied"
        );
        Ok(outcome)
    }
}

async fn upsert_on(
    conn: &mut SqliteConnection,
    table: &str,
    key_columns: &[String],
    record: &TableRecord,
) -> std::result::Result<RowOutcome, sqlx::Error> {
    let table_ident = quote_identifier(table);

    let keyed = !key_columns.is_empty()
        && key_columns
            .iter()
            .all(|k| record.get(k).is_some_and(|v| !v.is_null()));

    if keyed {
        let where_clause = key_columns
            .iter()
            .map(|k| format!("{} = ?", quote_identifier(k)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let set_columns: Vec<(&String, &FieldValue)> = record
            .iter()
            .filter(|(name, _)| !key_columns.contains(name))
            .collect();

        if set_columns.is_empty() {
            let sql = format!("SELECT 1 FROM {} WHERE {} LIMIT 1", table_ident, where_clause);
            let mut query = sqlx::query(&sql);
            for key in key_columns {
                query = bind_value(query, &record[key]);
            }
            if query.fetch_optional(&mut *conn).await?.is_some() {
                return Ok(RowOutcome::Updated);
            }
        } else {
            let assignments = set_columns
                .iter()
                .map(|(name, _)| format!("{} = ?", quote_identifier(name)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("UPDATE {} SET {} WHERE {}", table_ident, assignments, where_clause);
            let mut query = sqlx::query(&sql);
            for (_, value) in &set_columns {
                query = bind_value(query, value);
            }
            for key in key_columns {
                query = bind_value(query, &record[key]);
            }
            if query.execute(&mut *conn).await?.rows_affected() > 0 {
                return Ok(RowOutcome::Updated);
            }
        }
    }

    if record.is_empty() {
        sqlx::query(&format!("INSERT INTO {} DEFAULT VALUES", table_ident))
            .execute(&mut *conn)
            .await?;
        return Ok(RowOutcome::Inserted);
    }

    let columns = record
        .keys()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; record.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_ident, columns, placeholders
    );
    let mut query = sqlx::query(&sql);
    for value in record.values() {
        query = bind_value(query, value);
    }
    query.execute(&mut *conn).await?;

    Ok(RowOutcome::Inserted)
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &FieldValue) -> SqliteQuery<'q> {
    match value {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Real(r) => query.bind(*r),
        FieldValue::Bool(b) => query.bind(*b),
        FieldValue::Text(s) => query.bind(s.clone()),
    }
}

fn validate_record(key_columns: &[String], record: &TableRecord) -> Result<()> {
    for name in key_columns.iter().chain(record.keys()) {
        validate_identifier(name)?;
    }
    Ok(())
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use bridge_traits::BridgeError;

    async fn store() -> SqliteTableStore {
        let pool = create_test_pool().await.unwrap();
        sqlx::query(
            "CREATE TABLE reservations (
                reservation_no TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                tour_date TEXT,
                people INTEGER DEFAULT 1,
                paid BOOLEAN
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE \"odd\"\"name\" (value TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        SqliteTableStore::new(pool)
    }

    fn record(no: &str, name: &str) -> TableRecord {
        let mut record = TableRecord::new();
        record.insert("reservation_no".into(), FieldValue::Text(no.into()));
        record.insert("name".into(), FieldValue::Text(name.into()));
        record
    }

    fn keys() -> Vec<String> {
        vec!["reservation_no".to_string()]
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("tours"), "\"tours\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[core_async::test]
    async fn test_list_tables_hides_internal_tables() {
        let store = store().await;
        let tables = store.list_tables().await.unwrap();
        assert_eq!(tables, vec!["odd\"name".to_string(), "reservations".to_string()]);
    }

    #[core_async::test]
    async fn test_allow_list_filters_tables() {
        let store = store().await.with_allowed_tables(["reservations", "payments"]);
        assert_eq!(store.list_tables().await.unwrap(), vec!["reservations"]);

        let err = store.table_columns("odd\"name").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));

        let mut row = TableRecord::new();
        row.insert("value".into(), FieldValue::Text("x".into()));
        let err = store.upsert("odd\"name", &[], &row).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[core_async::test]
    async fn test_table_columns_reports_pragma_metadata() {
        let store = store().await;
        let columns = store.table_columns("reservations").await.unwrap();

        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["reservation_no", "name", "tour_date", "people", "paid"]);
        assert!(columns[0].primary_key);
        assert!(!columns[0].nullable);
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[3].data_type, "INTEGER");
        assert_eq!(columns[3].default_value.as_deref(), Some("1"));
    }

    #[core_async::test]
    async fn test_unknown_table_is_rejected() {
        let store = store().await;
        assert!(matches!(
            store.truncate("payments").await,
            Err(BridgeError::NotFound(_))
        ));
    }

    #[core_async::test]
    async fn test_upsert_inserts_then_updates_by_key() {
        let store = store().await;

        let first = store
            .upsert("reservations", &keys(), &record("R-1", "Kim"))
            .await
            .unwrap();
        let second = store
            .upsert("reservations", &keys(), &record("R-1", "Lee"))
            .await
            .unwrap();

        assert_eq!(first, RowOutcome::Inserted);
        assert_eq!(second, RowOutcome::Updated);

        let (name,): (String,) =
            sqlx::query_as("SELECT name FROM reservations WHERE reservation_no = 'R-1'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(name, "Lee");
    }

    #[core_async::test]
    async fn test_upsert_without_keys_always_inserts() {
        let store = store().await;
        let mut row = TableRecord::new();
        row.insert("value".into(), FieldValue::Text("x".into()));

        for _ in 0..2 {
            let outcome = store.upsert("odd\"name", &[], &row).await.unwrap();
            assert_eq!(outcome, RowOutcome::Inserted);
        }
    }

    #[core_async::test]
    async fn test_upsert_with_null_key_inserts() {
        let store = store().await;
        let mut row = TableRecord::new();
        row.insert("value".into(), FieldValue::Null);

        let outcome = store
            .upsert("odd\"name", &["value".to_string()], &row)
            .await
            .unwrap();
        assert_eq!(outcome, RowOutcome::Inserted);
    }

    #[core_async::test]
    async fn test_upsert_constraint_violation_is_database_error() {
        let store = store().await;
        let mut row = TableRecord::new();
        row.insert("reservation_no".into(), FieldValue::Text("R-9".into()));

        let err = store.upsert("reservations", &[], &row).await.unwrap_err();
        assert!(matches!(err, BridgeError::DatabaseError(msg) if msg.contains("NOT NULL")));
    }

    #[core_async::test]
    async fn test_closed_pool_is_not_a_row_error() {
        let store = store().await;
        store
            .upsert("reservations", &keys(), &record("R-1", "Kim"))
            .await
            .unwrap();
        store.pool().close().await;

        let err = store
            .upsert("reservations", &keys(), &record("R-2", "Lee"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));

        let err = store
            .apply_batch("reservations", &keys(), &[record("R-3", "Park")])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[core_async::test]
    async fn test_table_dropped_after_verification_is_not_found() {
        let store = store().await;
        store.table_columns("reservations").await.unwrap();
        sqlx::query("DROP TABLE reservations")
            .execute(store.pool())
            .await
            .unwrap();

        let err = store
            .upsert("reservations", &keys(), &record("R-1", "Kim"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[core_async::test]
    async fn test_truncate_returns_removed_rows() {
        let store = store().await;
        for i in 0..3 {
            store
                .upsert("reservations", &keys(), &record(&format!("R-{}", i), "Kim"))
                .await
                .unwrap();
        }

        assert_eq!(store.truncate("reservations").await.unwrap(), 3);
        assert_eq!(store.truncate("reservations").await.unwrap(), 0);
    }

    #[core_async::test]
    async fn test_apply_batch_collects_row_failures() {
        let store = store().await;
        store
            .upsert("reservations", &keys(), &record("R-1", "Kim"))
            .await
            .unwrap();

        let mut missing_name = TableRecord::new();
        missing_name.insert("reservation_no".into(), FieldValue::Text("R-3".into()));

        let batch = vec![
            record("R-1", "Park"),
            record("R-2", "Choi"),
            missing_name,
            record("R-4", "Jung"),
        ];
        let outcome = store
            .apply_batch("reservations", &keys(), &batch)
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 2);
        assert_eq!(outcome.processed(), 4);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reservations")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[core_async::test]
    async fn test_typed_values_round_trip() {
        let store = store().await;
        let mut row = record("R-5", "Han");
        row.insert("people".into(), FieldValue::Integer(4));
        row.insert("paid".into(), FieldValue::Bool(true));
        row.insert("tour_date".into(), FieldValue::Null);

        store.upsert("reservations", &keys(), &row).await.unwrap();

        let (people, paid, tour_date): (i64, bool, Option<String>) = sqlx::query_as(
            "SELECT people, paid, tour_date FROM reservations WHERE reservation_no = 'R-5'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(people, 4);
        assert!(paid);
        assert!(tour_date.is_none());
    }
}
