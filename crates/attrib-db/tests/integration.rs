//! Unit tests for attrib-db pool configuration and row types, plus
//! DB-backed tests for the attribution-run lifecycle.

use attrib_core::{AppConfig, Environment};
use attrib_db::{AttributionRunRow, CampaignLinkRow, PoolConfig};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        attribution_days_back: 7,
        attribution_schedule: "0 0 * * * *".to_string(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`AttributionRunRow`] has all
/// expected fields with the correct types. No database required.
#[test]
fn attribution_run_row_has_expected_fields() {
    use chrono::Utc;

    let row = AttributionRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        trigger_source: "api".to_string(),
        status: "queued".to_string(),
        days_back: 7_i32,
        window_start: "2026-03-01".parse().expect("date"),
        window_end: "2026-03-08".parse().expect("date"),
        conversions_generated: 0_i32,
        orders_processed: 0_i32,
        total_attributed_spend: Decimal::ZERO,
        total_attributed_revenue: Decimal::ZERO,
        started_at: None,
        completed_at: None,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.trigger_source, "api");
    assert_eq!(row.status, "queued");
    assert_eq!(row.days_back, 7);
    assert!(row.started_at.is_none());
    assert!(row.completed_at.is_none());
    assert_eq!(row.conversions_generated, 0);
    assert!(row.error_message.is_none());
}

/// Compile-time smoke test: confirm that [`CampaignLinkRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn campaign_link_row_has_expected_fields() {
    use chrono::Utc;

    let row = CampaignLinkRow {
        id: 42_i64,
        organization_id: Uuid::new_v4(),
        user_id: Some(Uuid::new_v4()),
        campaign_id: "23851234567890".to_string(),
        campaign_name: "Prospecting BR".to_string(),
        platform: "meta".to_string(),
        product_id: Some(7_i64),
        product_sku: "KIT-CHAVEIRO-10".to_string(),
        is_active: true,
        start_date: None,
        end_date: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.id, 42);
    assert_eq!(row.platform, "meta");
    assert_eq!(row.product_sku, "KIT-CHAVEIRO-10");
    assert!(row.is_active);
    assert!(row.covers("2026-01-01".parse().expect("date")));
}

// -------------------------------------------------------------------------
// Attribution-run lifecycle — DB-backed tests
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn attribution_run_walks_queued_running_succeeded(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let run = attrib_db::create_attribution_run(
        &pool,
        org,
        "cli",
        7,
        "2026-03-01".parse().expect("date"),
        "2026-03-08".parse().expect("date"),
    )
    .await
    .expect("create run");
    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());

    attrib_db::start_attribution_run(&pool, run.id)
        .await
        .expect("start run");
    attrib_db::complete_attribution_run(&pool, run.id, 3, 2, dec("12.50"), dec("40.00"))
        .await
        .expect("complete run");

    let fetched = attrib_db::get_attribution_run(&pool, run.id)
        .await
        .expect("get run");
    assert_eq!(fetched.status, "succeeded");
    assert_eq!(fetched.conversions_generated, 3);
    assert_eq!(fetched.orders_processed, 2);
    assert_eq!(fetched.total_attributed_spend, dec("12.50"));
    assert!(fetched.completed_at.is_some());

    let listed = attrib_db::list_attribution_runs(&pool, org, 10)
        .await
        .expect("list runs");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].public_id, run.public_id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn completing_a_queued_run_is_an_invalid_transition(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let run = attrib_db::create_attribution_run(
        &pool,
        org,
        "cli",
        7,
        "2026-03-01".parse().expect("date"),
        "2026-03-08".parse().expect("date"),
    )
    .await
    .expect("create run");

    let err = attrib_db::complete_attribution_run(&pool, run.id, 0, 0, dec("0"), dec("0"))
        .await
        .expect_err("completing a queued run must fail");
    assert!(matches!(
        err,
        attrib_db::DbError::InvalidRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_run_records_error_message(pool: sqlx::PgPool) {
    let org = Uuid::new_v4();
    let run = attrib_db::create_attribution_run(
        &pool,
        org,
        "scheduler",
        7,
        "2026-03-01".parse().expect("date"),
        "2026-03-08".parse().expect("date"),
    )
    .await
    .expect("create run");

    attrib_db::start_attribution_run(&pool, run.id)
        .await
        .expect("start run");
    attrib_db::fail_attribution_run(&pool, run.id, "simulated outage")
        .await
        .expect("fail run");

    let fetched = attrib_db::get_attribution_run(&pool, run.id)
        .await
        .expect("get run");
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("simulated outage"));
}

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}
