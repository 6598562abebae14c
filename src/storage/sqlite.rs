//! SQLite target registry
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Reads from API handlers proceed while a cycle commits its batch
//! - **Connection pooling**: Shared by the scheduler, ad-hoc triggers and the API
//! - **Migrations**: Schema created with `sqlx::migrate!`
//!
//! Outcome batches are written inside one transaction, so a cycle's outcomes are
//! either all visible or not at all.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::TargetRegistry;
use super::error::{StorageError, StorageResult};
use super::schema::{CheckOutcome, MonitoredTarget, NewTarget, Protocol, TargetUpdate};

const TARGET_COLUMNS: &str =
    "id, name, address, protocol, check_interval, is_active, created_at, updated_at";

/// SQLite-backed registry
pub struct SqliteRegistry {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteRegistry {
    /// Open (or create) the database file and run migrations
    ///
    /// ```no_run
    /// # use site_monitor::storage::sqlite::SqliteRegistry;
    /// # async fn example() -> anyhow::Result<()> {
    /// let registry = SqliteRegistry::new("./monitoring.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite registry at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("SQLite registry ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// The unique address index surfaces as `DuplicateAddress`
    fn write_error(err: sqlx::Error, address: &str) -> StorageError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::DuplicateAddress(address.to_string())
            }
            _ => err.into(),
        }
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn target_from_row(row: &SqliteRow) -> StorageResult<MonitoredTarget> {
        let protocol: String = row.try_get("protocol")?;
        let protocol = protocol
            .parse::<Protocol>()
            .map_err(StorageError::CorruptRow)?;

        Ok(MonitoredTarget {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            protocol,
            check_interval: row.try_get::<i64, _>("check_interval")? as u32,
            is_active: row.try_get("is_active")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?),
            updated_at: Self::millis_to_timestamp(row.try_get("updated_at")?),
        })
    }

    fn outcome_from_row(row: &SqliteRow) -> StorageResult<CheckOutcome> {
        Ok(CheckOutcome {
            id: Some(row.try_get("id")?),
            target_id: row.try_get("target_id")?,
            is_up: row.try_get("is_up")?,
            status_code: row
                .try_get::<Option<i64>, _>("status_code")?
                .map(|code| code as u16),
            latency_ms: row.try_get("latency_ms")?,
            error: row.try_get("error")?,
            checked_at: Self::millis_to_timestamp(row.try_get("checked_at")?),
        })
    }
}

#[async_trait]
impl TargetRegistry for SqliteRegistry {
    #[instrument(skip(self))]
    async fn list_targets(&self, active: Option<bool>) -> StorageResult<Vec<MonitoredTarget>> {
        let rows = match active {
            Some(active) => {
                sqlx::query(&format!(
                    "SELECT {TARGET_COLUMNS} FROM targets WHERE is_active = ? ORDER BY id ASC"
                ))
                .bind(active)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {TARGET_COLUMNS} FROM targets ORDER BY id ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::target_from_row).collect()
    }

    async fn get_target(&self, id: i64) -> StorageResult<Option<MonitoredTarget>> {
        let row = sqlx::query(&format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::target_from_row).transpose()
    }

    async fn find_by_address(&self, address: &str) -> StorageResult<Option<MonitoredTarget>> {
        let row = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE address = ? LIMIT 1"
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::target_from_row).transpose()
    }

    #[instrument(skip(self, target), fields(name = %target.name))]
    async fn create_target(&self, target: NewTarget) -> StorageResult<MonitoredTarget> {
        let now = Utc::now();
        let millis = Self::timestamp_to_millis(&now);

        let result = sqlx::query(
            r#"
            INSERT INTO targets (name, address, protocol, check_interval, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&target.name)
        .bind(&target.address)
        .bind(target.protocol.as_str())
        .bind(target.check_interval as i64)
        .bind(target.is_active)
        .bind(millis)
        .bind(millis)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::write_error(e, &target.address))?;

        let id = result.last_insert_rowid();
        debug!("created target {}", id);

        // Re-read so timestamps carry the stored millisecond precision
        self.get_target(id)
            .await?
            .ok_or_else(|| StorageError::QueryFailed(format!("target {id} vanished after insert")))
    }

    #[instrument(skip(self, update))]
    async fn update_target(
        &self,
        id: i64,
        update: TargetUpdate,
    ) -> StorageResult<Option<MonitoredTarget>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut target = Self::target_from_row(&row)?;
        update.apply(&mut target, Utc::now());

        sqlx::query(
            r#"
            UPDATE targets
            SET name = ?, address = ?, protocol = ?, check_interval = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&target.name)
        .bind(&target.address)
        .bind(target.protocol.as_str())
        .bind(target.check_interval as i64)
        .bind(target.is_active)
        .bind(Self::timestamp_to_millis(&target.updated_at))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::write_error(e, &target.address))?;

        tx.commit().await?;

        // Round to what a subsequent read returns
        target.updated_at =
            Self::millis_to_timestamp(Self::timestamp_to_millis(&target.updated_at));
        Ok(Some(target))
    }

    #[instrument(skip(self))]
    async fn delete_target(&self, id: i64) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM check_outcomes WHERE target_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM targets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, outcomes), fields(count = outcomes.len()))]
    async fn insert_outcomes(&self, outcomes: Vec<CheckOutcome>) -> StorageResult<()> {
        if outcomes.is_empty() {
            return Ok(());
        }

        debug!("inserting {} outcomes into SQLite", outcomes.len());

        let mut tx = self.pool.begin().await?;

        for outcome in outcomes {
            sqlx::query(
                r#"
                INSERT INTO check_outcomes (target_id, is_up, status_code, latency_ms, error, checked_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(outcome.target_id)
            .bind(outcome.is_up)
            .bind(outcome.status_code.map(|code| code as i64))
            .bind(outcome.latency_ms)
            .bind(&outcome.error)
            .bind(Self::timestamp_to_millis(&outcome.checked_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("outcome batch committed");
        Ok(())
    }

    async fn latest_outcomes(
        &self,
        target_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<CheckOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT id, target_id, is_up, status_code, latency_ms, error, checked_at
            FROM check_outcomes
            WHERE target_id = ?
            ORDER BY checked_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(target_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::outcome_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<String> {
        let targets: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM targets")
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| warn!("health check failed: {}", e))?;

        let outcomes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM check_outcomes")
            .fetch_one(&self.pool)
            .await?;

        let file_size_mb = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0) as f64
            / 1_000_000.0;

        Ok(format!(
            "SQLite: {} targets, {} outcomes, {:.2} MB on disk",
            targets.0, outcomes.0, file_size_mb
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite registry");
        self.pool.close().await;
        Ok(())
    }
}
