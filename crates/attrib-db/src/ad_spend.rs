//! Database operations for `ad_spend_metrics`.
//!
//! Per-campaign, per-day spend is ingested by the ad-platform sync processes;
//! the engine only ever aggregates it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Total spend for one campaign across an attribution window.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignSpendRow {
    pub campaign_id: String,
    pub total_spend: Decimal,
}

/// Sums spend per campaign over the inclusive `[window_start, window_end]`
/// window, restricted to the given campaign ids (the ones referenced by the
/// organization's active links).
///
/// Campaigns with no spend rows in the window are simply absent from the
/// result; callers treat missing campaigns as zero spend.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sum_spend_by_campaign(
    pool: &PgPool,
    organization_id: Uuid,
    campaign_ids: &[String],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<Vec<CampaignSpendRow>, DbError> {
    if campaign_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, CampaignSpendRow>(
        "SELECT campaign_id, SUM(spend) AS total_spend \
         FROM ad_spend_metrics \
         WHERE organization_id = $1 \
           AND campaign_id = ANY($2) \
           AND date >= $3 AND date <= $4 \
         GROUP BY campaign_id",
    )
    .bind(organization_id)
    .bind(campaign_ids)
    .bind(window_start)
    .bind(window_end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
