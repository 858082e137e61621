//! # Sync Run Repository
//!
//! Persists [`SyncRun`]s in the `sync_runs` table and answers the
//! last-sync-time query behind `GET /sync/history`.

use crate::job::{RunStats, RunStatus, SyncMode, SyncRun, SyncRunId};
use crate::{Result, SyncError};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn insert(&self, run: &SyncRun) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`SyncError::RunNotFound`] if the run was never inserted
    async fn update(&self, run: &SyncRun) -> Result<()>;

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>>;

    /// Completion time (epoch ms) of the most recent completed run for the
    /// table and spreadsheet pair.
    async fn last_sync_time(&self, target_table: &str, spreadsheet_id: &str)
        -> Result<Option<i64>>;

    /// Most recent runs first.
    async fn history(
        &self,
        target_table: &str,
        spreadsheet_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncRun>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SyncRunRow {
    id: String,
    target_table: String,
    spreadsheet_id: String,
    sheet_name: String,
    mode: String,
    truncate_table: bool,
    status: String,
    total_rows: Option<i64>,
    processed: i64,
    inserted: i64,
    updated: i64,
    errors: i64,
    message: Option<String>,
    started_at: i64,
    completed_at: Option<i64>,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = SyncError;

    fn try_from(row: SyncRunRow) -> Result<Self> {
        Ok(SyncRun {
            id: SyncRunId::from_string(&row.id)?,
            target_table: row.target_table,
            spreadsheet_id: row.spreadsheet_id,
            sheet_name: row.sheet_name,
            mode: row.mode.parse::<SyncMode>()?,
            truncate_table: row.truncate_table,
            status: row.status.parse::<RunStatus>()?,
            stats: RunStats {
                total: row.total_rows.map(|t| t.max(0) as u64),
                processed: row.processed.max(0) as u64,
                inserted: row.inserted.max(0) as u64,
                updated: row.updated.max(0) as u64,
                errors: row.errors.max(0) as u64,
            },
            message: row.message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, target_table, spreadsheet_id, sheet_name, mode, truncate_table,
           status, total_rows, processed, inserted, updated, errors,
           message, started_at, completed_at
    FROM sync_runs
"#;

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, target_table, spreadsheet_id, sheet_name, mode, truncate_table,
                status, total_rows, processed, inserted, updated, errors,
                message, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.as_str())
        .bind(&run.target_table)
        .bind(&run.spreadsheet_id)
        .bind(&run.sheet_name)
        .bind(run.mode.as_str())
        .bind(run.truncate_table)
        .bind(run.status.as_str())
        .bind(run.stats.total.map(|t| t as i64))
        .bind(run.stats.processed as i64)
        .bind(run.stats.inserted as i64)
        .bind(run.stats.updated as i64)
        .bind(run.stats.errors as i64)
        .bind(&run.message)
        .bind(run.started_at)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, run: &SyncRun) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs SET
                status = ?,
                total_rows = ?,
                processed = ?,
                inserted = ?,
                updated = ?,
                errors = ?,
                message = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(run.status.as_str())
        .bind(run.stats.total.map(|t| t as i64))
        .bind(run.stats.processed as i64)
        .bind(run.stats.inserted as i64)
        .bind(run.stats.updated as i64)
        .bind(run.stats.errors as i64)
        .bind(&run.message)
        .bind(run.completed_at)
        .bind(run.id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::RunNotFound {
                run_id: run.id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>> {
        let row = sqlx::query_as::<_, SyncRunRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(SyncRun::try_from).transpose()
    }

    async fn last_sync_time(
        &self,
        target_table: &str,
        spreadsheet_id: &str,
    ) -> Result<Option<i64>> {
        let time = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(completed_at)
            FROM sync_runs
            WHERE target_table = ? AND spreadsheet_id = ? AND status = 'completed'
            "#,
        )
        .bind(target_table)
        .bind(spreadsheet_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(time)
    }

    async fn history(
        &self,
        target_table: &str,
        spreadsheet_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
            "{} WHERE target_table = ? AND spreadsheet_id = ? ORDER BY started_at DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(target_table)
        .bind(spreadsheet_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(SyncRun::try_from)
            .collect::<Result<Vec<_>>>()
    }
}
