//! Database operations for `orders` and `order_items`.
//!
//! Orders are written by the marketplace sync processes; within an
//! attribution run they are immutable inputs.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub source_order_id: String,
    pub ordered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `order_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    /// `NULL` for marketplace lines without a seller SKU; such lines are
    /// ignored by attribution.
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// An order joined with its line items, as consumed by the engine.
#[derive(Debug, Clone)]
pub struct OrderWithItems {
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

impl OrderWithItems {
    /// Calendar date of the order (UTC date part of `ordered_at`).
    #[must_use]
    pub fn order_date(&self) -> NaiveDate {
        self.order.ordered_at.date_naive()
    }
}

/// Loads every order for one organization whose order date falls inside the
/// inclusive `[window_start, window_end]` calendar window, with line items.
///
/// Two queries: orders first, then all items for those orders in one shot,
/// grouped in memory. Orders without items are kept (they simply produce no
/// conversions).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_orders_in_window(
    pool: &PgPool,
    organization_id: Uuid,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<Vec<OrderWithItems>, DbError> {
    let orders = sqlx::query_as::<_, OrderRow>(
        "SELECT id, organization_id, marketplace, source_order_id, ordered_at, created_at \
         FROM orders \
         WHERE organization_id = $1 \
           AND (ordered_at AT TIME ZONE 'UTC')::date >= $2 \
           AND (ordered_at AT TIME ZONE 'UTC')::date <= $3 \
         ORDER BY ordered_at, id",
    )
    .bind(organization_id)
    .bind(window_start)
    .bind(window_end)
    .fetch_all(pool)
    .await?;

    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

    let items = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, sku, unit_price, quantity \
         FROM order_items \
         WHERE order_id = ANY($1) \
         ORDER BY order_id, id",
    )
    .bind(&order_ids)
    .fetch_all(pool)
    .await?;

    let mut by_order: HashMap<i64, Vec<OrderItemRow>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}
