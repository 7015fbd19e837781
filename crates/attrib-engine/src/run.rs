//! Orchestrated attribution run: load, compute, persist, bookkeeping.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{compute_conversions, AttributionWindow, ComputeInput, EngineError};

/// Result of one attribution run, as reported to the caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_public_id: Uuid,
    pub attributed: usize,
    pub orders_processed: usize,
    pub message: String,
}

struct RunTotals {
    attributed: usize,
    orders_processed: usize,
    spend: Decimal,
    revenue: Decimal,
    message: String,
}

impl RunTotals {
    fn empty(message: impl Into<String>) -> Self {
        Self {
            attributed: 0,
            orders_processed: 0,
            spend: Decimal::ZERO,
            revenue: Decimal::ZERO,
            message: message.into(),
        }
    }
}

/// Runs one attribution pass for an organization.
///
/// Creates an `attribution_runs` row, executes the batch, and completes or
/// fails the row. Early exits (no active links, no orders in the window) are
/// successes with zero output, and still complete the run row so the audit
/// trail records the sweep.
///
/// `days_back` has already been validated non-negative at the edge (see
/// [`crate::validate_days_back`]); the window is `[today - days_back, today]`
/// on UTC calendar dates.
///
/// # Errors
///
/// Returns [`EngineError::Db`] if any load or write fails. The run row is
/// marked failed (best effort) before the error propagates; nothing is
/// retried.
pub async fn run_attribution(
    pool: &PgPool,
    organization_id: Uuid,
    days_back: u32,
    trigger_source: &str,
) -> Result<RunOutcome, EngineError> {
    let today = Utc::now().date_naive();
    let window = AttributionWindow::lookback(today, days_back);

    let run = attrib_db::create_attribution_run(
        pool,
        organization_id,
        trigger_source,
        i32::try_from(days_back).unwrap_or(i32::MAX),
        window.start,
        window.end,
    )
    .await?;
    attrib_db::start_attribution_run(pool, run.id).await?;

    tracing::info!(
        organization_id = %organization_id,
        run = %run.public_id,
        window_start = %window.start,
        window_end = %window.end,
        trigger = trigger_source,
        "attribution run started"
    );

    match execute(pool, run.id, organization_id, window).await {
        Ok(totals) => {
            attrib_db::complete_attribution_run(
                pool,
                run.id,
                i32::try_from(totals.attributed).unwrap_or(i32::MAX),
                i32::try_from(totals.orders_processed).unwrap_or(i32::MAX),
                totals.spend,
                totals.revenue,
            )
            .await?;

            tracing::info!(
                organization_id = %organization_id,
                run = %run.public_id,
                attributed = totals.attributed,
                orders = totals.orders_processed,
                "attribution run complete"
            );

            Ok(RunOutcome {
                run_public_id: run.public_id,
                attributed: totals.attributed,
                orders_processed: totals.orders_processed,
                message: totals.message,
            })
        }
        Err(e) => {
            tracing::error!(
                organization_id = %organization_id,
                run = %run.public_id,
                error = %e,
                "attribution run failed"
            );
            // Best effort; the original error is the one worth surfacing.
            if let Err(mark) =
                attrib_db::fail_attribution_run(pool, run.id, &e.to_string()).await
            {
                tracing::warn!(run = %run.public_id, error = %mark, "failed to mark run as failed");
            }
            Err(e)
        }
    }
}

async fn execute(
    pool: &PgPool,
    run_id: i64,
    organization_id: Uuid,
    window: AttributionWindow,
) -> Result<RunTotals, EngineError> {
    let links = attrib_db::list_active_campaign_links(pool, organization_id).await?;
    if links.is_empty() {
        return Ok(RunTotals::empty("no active campaign links"));
    }

    let orders =
        attrib_db::list_orders_in_window(pool, organization_id, window.start, window.end).await?;
    if orders.is_empty() {
        return Ok(RunTotals::empty("no orders in attribution window"));
    }

    let mut campaign_ids: Vec<String> = links.iter().map(|l| l.campaign_id.clone()).collect();
    campaign_ids.sort_unstable();
    campaign_ids.dedup();

    let spend_by_campaign: HashMap<String, Decimal> =
        attrib_db::sum_spend_by_campaign(pool, organization_id, &campaign_ids, window.start, window.end)
            .await?
            .into_iter()
            .map(|row| (row.campaign_id, row.total_spend))
            .collect();

    let conversions = compute_conversions(&ComputeInput {
        links: &links,
        orders: &orders,
        spend_by_campaign: &spend_by_campaign,
    });

    // Delete-then-insert for the full set of orders in the window, so a
    // re-run replaces rather than accumulates. Also runs when the computed
    // set is empty: stale conversions for these orders must still go.
    let order_ids: Vec<i64> = orders.iter().map(|o| o.order.id).collect();
    attrib_db::replace_conversions(pool, run_id, organization_id, &order_ids, &conversions)
        .await?;

    let spend: Decimal = conversions.iter().map(|c| c.attributed_spend).sum();
    let revenue: Decimal = conversions.iter().map(|c| c.order_value).sum();

    Ok(RunTotals {
        attributed: conversions.len(),
        orders_processed: orders.len(),
        message: format!(
            "attributed {} conversions across {} orders",
            conversions.len(),
            orders.len()
        ),
        spend,
        revenue,
    })
}
