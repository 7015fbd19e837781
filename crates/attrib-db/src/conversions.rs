//! Database operations for `attributed_conversions`.

use attrib_core::AttributionMethod;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `attributed_conversions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversionRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub attribution_run_id: Option<i64>,
    pub order_id: i64,
    pub campaign_id: String,
    pub campaign_name: String,
    pub platform: String,
    pub product_id: Option<i64>,
    pub product_sku: String,
    pub attributed_spend: Decimal,
    pub order_value: Decimal,
    pub quantity: i32,
    /// `time_window` or `proportional`; see [`AttributionMethod`].
    pub attribution_method: String,
    pub attribution_weight: Decimal,
    pub conversion_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A conversion computed by the engine, ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewConversion {
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub order_id: i64,
    pub campaign_id: String,
    pub campaign_name: String,
    pub platform: String,
    pub product_id: Option<i64>,
    pub product_sku: String,
    pub attributed_spend: Decimal,
    pub order_value: Decimal,
    pub quantity: i32,
    pub attribution_method: AttributionMethod,
    pub attribution_weight: Decimal,
    pub conversion_date: NaiveDate,
}

/// Replaces the conversions for a set of orders and refreshes the product
/// ROAS aggregates, all inside one transaction.
///
/// The sequence is: delete every existing conversion for the touched orders,
/// insert the newly computed set tagged with `attribution_run_id`, then
/// overwrite `total_attributed_spend` / `total_attributed_revenue` /
/// `attributed_roas` on each product referenced by this run's conversions.
/// Re-running with unchanged inputs therefore yields an identical row set
/// rather than accumulating duplicates, and a concurrent reader never
/// observes the transient empty state between delete and insert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back and no rows change.
pub async fn replace_conversions(
    pool: &PgPool,
    attribution_run_id: i64,
    organization_id: Uuid,
    order_ids: &[i64],
    conversions: &[NewConversion],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM attributed_conversions \
         WHERE organization_id = $1 AND order_id = ANY($2)",
    )
    .bind(organization_id)
    .bind(order_ids)
    .execute(&mut *tx)
    .await?;

    for c in conversions {
        sqlx::query(
            "INSERT INTO attributed_conversions \
                 (organization_id, user_id, attribution_run_id, order_id, \
                  campaign_id, campaign_name, platform, product_id, product_sku, \
                  attributed_spend, order_value, quantity, \
                  attribution_method, attribution_weight, conversion_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, \
                     $10::numeric(12,4), $11::numeric(12,2), $12, \
                     $13, $14::numeric(8,6), $15)",
        )
        .bind(c.organization_id)
        .bind(c.user_id)
        .bind(attribution_run_id)
        .bind(c.order_id)
        .bind(&c.campaign_id)
        .bind(&c.campaign_name)
        .bind(&c.platform)
        .bind(c.product_id)
        .bind(&c.product_sku)
        .bind(c.attributed_spend)
        .bind(c.order_value)
        .bind(c.quantity)
        .bind(c.attribution_method.as_str())
        .bind(c.attribution_weight)
        .bind(c.conversion_date)
        .execute(&mut *tx)
        .await?;
    }

    // Overwrite product aggregates from this run's conversions only. ROAS is
    // revenue / spend, 0 when spend is 0.
    sqlx::query(
        "WITH sums AS ( \
             SELECT product_id, \
                    SUM(attributed_spend) AS spend, \
                    SUM(order_value) AS revenue \
             FROM attributed_conversions \
             WHERE attribution_run_id = $1 AND product_id IS NOT NULL \
             GROUP BY product_id \
         ) \
         UPDATE products p \
         SET total_attributed_spend = ROUND(sums.spend, 2), \
             total_attributed_revenue = ROUND(sums.revenue, 2), \
             attributed_roas = CASE \
                 WHEN sums.spend = 0 THEN 0 \
                 ELSE ROUND(sums.revenue / sums.spend, 4) \
             END, \
             updated_at = NOW() \
         FROM sums \
         WHERE p.id = sums.product_id",
    )
    .bind(attribution_run_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Lists the most recent conversions for one organization, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_conversions(
    pool: &PgPool,
    organization_id: Uuid,
    limit: i64,
) -> Result<Vec<ConversionRow>, DbError> {
    let rows = sqlx::query_as::<_, ConversionRow>(
        "SELECT id, organization_id, user_id, attribution_run_id, order_id, \
                campaign_id, campaign_name, platform, product_id, product_sku, \
                attributed_spend, order_value, quantity, \
                attribution_method, attribution_weight, conversion_date, created_at \
         FROM attributed_conversions \
         WHERE organization_id = $1 \
         ORDER BY conversion_date DESC, id DESC \
         LIMIT $2",
    )
    .bind(organization_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
