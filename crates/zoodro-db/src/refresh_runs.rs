//! Database operations for the `refresh_runs` history table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// What kicked off a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Scheduler,
    Cli,
    Startup,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Cli => "cli",
            TriggerSource::Startup => "startup",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `refresh_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub vendors_listed: i64,
    pub vendors_committed: i64,
    pub vendors_pruned: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Totals recorded when a run succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshRunCounts {
    pub vendors_listed: i64,
    pub vendors_committed: i64,
    pub vendors_pruned: i64,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
                           vendors_listed, vendors_committed, vendors_pruned, error_message, \
                           created_at";

/// Inserts a new run directly in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn start_refresh_run(
    pool: &PgPool,
    trigger_source: TriggerSource,
) -> Result<RefreshRunRow, DbError> {
    let row = sqlx::query_as::<_, RefreshRunRow>(&format!(
        "INSERT INTO refresh_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'running') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger_source.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a `running` run as `succeeded` and records its totals.
///
/// # Errors
///
/// Returns [`DbError::InvalidRefreshRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_refresh_run(
    pool: &PgPool,
    id: i64,
    counts: RefreshRunCounts,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE refresh_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             vendors_listed = $1, vendors_committed = $2, vendors_pruned = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(counts.vendors_listed)
    .bind(counts.vendors_committed)
    .bind(counts.vendors_pruned)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRefreshRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a `running` run as `failed` with `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRefreshRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_refresh_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE refresh_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRefreshRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_refresh_run(pool: &PgPool, id: i64) -> Result<RefreshRunRow, DbError> {
    sqlx::query_as::<_, RefreshRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM refresh_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_refresh_runs(pool: &PgPool, limit: i64) -> Result<Vec<RefreshRunRow>, DbError> {
    let rows = sqlx::query_as::<_, RefreshRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM refresh_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
