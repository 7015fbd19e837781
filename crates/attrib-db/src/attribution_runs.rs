//! Database operations for `attribution_runs`.
//!
//! Each engine invocation gets a run row so the overwrite-style product
//! aggregates stay auditable: the row records the window, trigger, counts,
//! and totals of every sweep, including early exits with zero output.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `attribution_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttributionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub organization_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub days_back: i32,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub conversions_generated: i32,
    pub orders_processed: i32,
    pub total_attributed_spend: Decimal,
    pub total_attributed_revenue: Decimal,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, organization_id, trigger_source, status, \
     days_back, window_start, window_end, \
     conversions_generated, orders_processed, \
     total_attributed_spend, total_attributed_revenue, \
     started_at, completed_at, error_message, created_at";

/// Creates a new attribution run in `queued` status.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_attribution_run(
    pool: &PgPool,
    organization_id: Uuid,
    trigger_source: &str,
    days_back: i32,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<AttributionRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, AttributionRunRow>(&format!(
        "INSERT INTO attribution_runs \
             (public_id, organization_id, trigger_source, status, \
              days_back, window_start, window_end) \
         VALUES ($1, $2, $3, 'queued', $4, $5, $6) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(organization_id)
    .bind(trigger_source)
    .bind(days_back)
    .bind(window_start)
    .bind(window_end)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not currently
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_attribution_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE attribution_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records its counts and totals.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not currently
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_attribution_run(
    pool: &PgPool,
    id: i64,
    conversions_generated: i32,
    orders_processed: i32,
    total_attributed_spend: Decimal,
    total_attributed_revenue: Decimal,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE attribution_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             conversions_generated = $1, orders_processed = $2, \
             total_attributed_spend = $3::numeric(12,2), \
             total_attributed_revenue = $4::numeric(12,2) \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(conversions_generated)
    .bind(orders_processed)
    .bind(total_attributed_spend)
    .bind(total_attributed_revenue)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not currently
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_attribution_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE attribution_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_attribution_run(pool: &PgPool, id: i64) -> Result<AttributionRunRow, DbError> {
    let row = sqlx::query_as::<_, AttributionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM attribution_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Lists the most recent runs for one organization, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_attribution_runs(
    pool: &PgPool,
    organization_id: Uuid,
    limit: i64,
) -> Result<Vec<AttributionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, AttributionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} \
         FROM attribution_runs \
         WHERE organization_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(organization_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
