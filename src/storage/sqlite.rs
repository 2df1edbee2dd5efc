//! SQLite storage implementation
//!
//! Embedded database, no separate server. WAL journal mode keeps reads
//! usable while independent target ticks write concurrently; every tick
//! commits through its own pooled connection, and [`SqliteStore::record_tick`]
//! wraps the state update and its check record in one transaction.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{Storage, TargetInsert};
use super::error::{StorageError, StorageResult};
use super::schema::{AlertEvent, CheckRecord, Target, TargetId, TargetState, UptimeStats};

/// SQLite-backed store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (and create if missing) the database at `database_url` and run
    /// migrations. Accepts `sqlite://...` URLs or plain file paths.
    #[instrument(skip_all)]
    pub async fn new(database_url: &str) -> StorageResult<Self> {
        let path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        info!("initializing SQLite store at: {path}");

        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
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

        Ok(Self { pool })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn row_to_target(row: &SqliteRow) -> Target {
        Target {
            id: row.get("id"),
            name: row.get("name"),
            url: row.get("url"),
            check_interval_secs: row.get::<i64, _>("check_interval") as u64,
            active: row.get("active"),
            state: TargetState {
                is_up: row.get("is_up"),
                last_status_code: row
                    .get::<Option<i64>, _>("last_status_code")
                    .map(|v| v as u16),
                last_response_time: row.get("last_response_time"),
                last_checked_at: row
                    .get::<Option<i64>, _>("last_checked_at")
                    .map(Self::millis_to_timestamp),
                last_fingerprint: row.get("last_fingerprint"),
                consecutive_failures: row.get::<i64, _>("consecutive_failures") as u32,
            },
        }
    }

    fn row_to_check_record(row: &SqliteRow) -> CheckRecord {
        CheckRecord {
            target_id: row.get("target_id"),
            timestamp: Self::millis_to_timestamp(row.get("timestamp")),
            status_code: row.get::<i64, _>("status_code") as u16,
            response_time: row.get("response_time"),
            is_up: row.get("is_up"),
            fingerprint: row.get("fingerprint"),
            error_message: row.get("error_message"),
        }
    }
}

/// Bind order shared by `update_target_state` and `record_tick`.
fn bind_state<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    state: &'q TargetState,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(state.is_up)
        .bind(state.last_status_code.map(|v| v as i64))
        .bind(state.last_response_time)
        .bind(state.last_checked_at.map(|t| t.timestamp_millis()))
        .bind(&state.last_fingerprint)
        .bind(state.consecutive_failures as i64)
}

const UPDATE_STATE_SQL: &str = r#"
    UPDATE targets SET
        is_up = ?,
        last_status_code = ?,
        last_response_time = ?,
        last_checked_at = ?,
        last_fingerprint = ?,
        consecutive_failures = ?
    WHERE id = ?
"#;

const INSERT_CHECK_SQL: &str = r#"
    INSERT INTO check_log (
        target_id, timestamp, status_code, response_time,
        is_up, fingerprint, error_message
    )
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

#[async_trait]
impl Storage for SqliteStore {
    #[instrument(skip(self))]
    async fn add_target(
        &self,
        name: &str,
        url: &str,
        interval_secs: u64,
    ) -> StorageResult<TargetInsert> {
        let result = sqlx::query(
            "INSERT INTO targets (name, url, check_interval) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(url)
        .bind(interval_secs as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(TargetInsert::Created(Target {
                id: done.last_insert_rowid(),
                name: name.to_string(),
                url: url.to_string(),
                check_interval_secs: interval_secs,
                active: true,
                state: TargetState::default(),
            })),
            // the UNIQUE(url) constraint is the duplicate check
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!("target url already tracked: {url}");
                Ok(TargetInsert::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_targets(&self, active_only: bool) -> StorageResult<Vec<Target>> {
        let sql = if active_only {
            "SELECT * FROM targets WHERE active = 1 ORDER BY id"
        } else {
            "SELECT * FROM targets ORDER BY id"
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::row_to_target).collect())
    }

    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>> {
        let row = sqlx::query("SELECT * FROM targets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::row_to_target))
    }

    #[instrument(skip(self, state))]
    async fn update_target_state(&self, id: TargetId, state: &TargetState) -> StorageResult<()> {
        bind_state(sqlx::query(UPDATE_STATE_SQL), state)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_target_active(&self, id: TargetId, active: bool) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE targets SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, state, record))]
    async fn record_tick(
        &self,
        id: TargetId,
        state: &TargetState,
        record: &CheckRecord,
    ) -> StorageResult<()> {
        // state and its history row commit together or not at all
        let mut tx = self.pool.begin().await?;

        bind_state(sqlx::query(UPDATE_STATE_SQL), state)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(INSERT_CHECK_SQL)
            .bind(record.target_id)
            .bind(Self::timestamp_to_millis(&record.timestamp))
            .bind(record.status_code as i64)
            .bind(record.response_time)
            .bind(record.is_up)
            .bind(&record.fingerprint)
            .bind(&record.error_message)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn append_check_record(&self, record: &CheckRecord) -> StorageResult<()> {
        sqlx::query(INSERT_CHECK_SQL)
            .bind(record.target_id)
            .bind(Self::timestamp_to_millis(&record.timestamp))
            .bind(record.status_code as i64)
            .bind(record.response_time)
            .bind(record.is_up)
            .bind(&record.fingerprint)
            .bind(&record.error_message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_alert_event(&self, event: &AlertEvent) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO alert_log (target_id, timestamp, kind, message) VALUES (?, ?, ?, ?)",
        )
        .bind(event.target_id)
        .bind(Self::timestamp_to_millis(&event.timestamp))
        .bind(event.kind.to_string())
        .bind(&event.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(since = %since))]
    async fn query_check_records(
        &self,
        id: TargetId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<CheckRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT target_id, timestamp, status_code, response_time,
                   is_up, fingerprint, error_message
            FROM check_log
            WHERE target_id = ? AND timestamp >= ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(id)
        .bind(Self::timestamp_to_millis(&since))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_check_record).collect())
    }

    async fn uptime_since(&self, id: TargetId, since: DateTime<Utc>) -> StorageResult<UptimeStats> {
        let (total, up): (i64, Option<i64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), SUM(is_up)
            FROM check_log
            WHERE target_id = ? AND timestamp >= ?
            "#,
        )
        .bind(id)
        .bind(Self::timestamp_to_millis(&since))
        .fetch_one(&self.pool)
        .await?;

        Ok(UptimeStats::from_counts(
            total as u64,
            up.unwrap_or(0) as u64,
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
