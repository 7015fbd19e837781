//! Database operations for `products`.
//!
//! The catalog itself is maintained by the marketplace sync processes; this
//! module only exposes the attribution aggregates the engine writes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Per-product attribution aggregates, as overwritten by the latest run.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRoasRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub sku: String,
    pub name: String,
    pub total_attributed_spend: Decimal,
    pub total_attributed_revenue: Decimal,
    pub attributed_roas: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Lists products for one organization ordered by attributed spend, highest
/// first. Products the engine has never touched show zero aggregates.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_roas(
    pool: &PgPool,
    organization_id: Uuid,
    limit: i64,
) -> Result<Vec<ProductRoasRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRoasRow>(
        "SELECT id, organization_id, sku, name, \
                total_attributed_spend, total_attributed_revenue, attributed_roas, \
                updated_at \
         FROM products \
         WHERE organization_id = $1 \
         ORDER BY total_attributed_spend DESC, id \
         LIMIT $2",
    )
    .bind(organization_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
