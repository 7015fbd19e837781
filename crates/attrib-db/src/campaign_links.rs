//! Database operations for `campaign_links`.
//!
//! Links are created and edited by tenant users through the back-office UI;
//! the attribution engine only ever reads them.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `campaign_links` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignLinkRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub campaign_id: String,
    pub campaign_name: String,
    pub platform: String,
    pub product_id: Option<i64>,
    pub product_sku: String,
    pub is_active: bool,
    /// Open-ended when `NULL`: the link is valid from the beginning of time.
    pub start_date: Option<NaiveDate>,
    /// Open-ended when `NULL`: the link never expires.
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignLinkRow {
    /// Whether an order placed on `date` falls inside this link's validity
    /// window. A missing bound is treated as unbounded on that side; both
    /// bounds are inclusive.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start_date {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// Loads every active campaign link for one organization.
///
/// Validity-window filtering happens per order line in the engine, not here —
/// a link can cover some orders in the window and not others.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_campaign_links(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<CampaignLinkRow>, DbError> {
    let rows = sqlx::query_as::<_, CampaignLinkRow>(
        "SELECT id, organization_id, user_id, campaign_id, campaign_name, platform, \
                product_id, product_sku, is_active, start_date, end_date, \
                created_at, updated_at \
         FROM campaign_links \
         WHERE organization_id = $1 AND is_active = TRUE \
         ORDER BY id",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists distinct organizations that have at least one active campaign link.
///
/// Used by the scheduled sweep to decide which tenants to run attribution for.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_organizations_with_active_links(pool: &PgPool) -> Result<Vec<Uuid>, DbError> {
    let rows = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT organization_id \
         FROM campaign_links \
         WHERE is_active = TRUE \
         ORDER BY organization_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
