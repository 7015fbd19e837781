//! Postgres access for the attribution service: pool construction, embedded
//! migrations, and one module per table family.

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

// Relative to this crate's manifest; resolves to <workspace-root>/migrations/.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Connection pool sizing. Defaults suit a single service instance sharing a
/// small Postgres; override via env or app config for anything bigger.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_connections: env_parse("ATTRIB_DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_parse("ATTRIB_DB_MIN_CONNECTIONS", defaults.min_connections),
            acquire_timeout_secs: env_parse(
                "ATTRIB_DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            ),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &attrib_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

fn env_parse<T: FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("attribution run {id} is not in status '{expected_status}'")]
    InvalidRunTransition { id: i64, expected_status: &'static str },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Opens a pool against `database_url` with the given sizing.
///
/// # Errors
///
/// Returns [`sqlx::Error`] when no connection can be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Opens a pool using `DATABASE_URL` and the `ATTRIB_DB_*` sizing variables.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] when `DATABASE_URL` is unset, or
/// [`DbError::Sqlx`] when the connection fails.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    connect_pool(&database_url, PoolConfig::from_env())
        .await
        .map_err(DbError::from)
}

/// Applies any pending embedded migrations.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] when a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Verifies the pool can reach Postgres with a trivial round trip.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] when the round trip fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_sizing() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 10);
    }

    #[test]
    fn env_parse_falls_back_on_missing_or_garbage() {
        env::remove_var("ATTRIB_DB_TEST_UNSET");
        assert_eq!(env_parse("ATTRIB_DB_TEST_UNSET", 7u32), 7);

        env::set_var("ATTRIB_DB_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_parse("ATTRIB_DB_TEST_GARBAGE", 7u32), 7);
        env::remove_var("ATTRIB_DB_TEST_GARBAGE");
    }
}

pub mod ad_spend;
pub mod attribution_runs;
pub mod campaign_links;
pub mod conversions;
pub mod orders;
pub mod products;

pub use ad_spend::{sum_spend_by_campaign, CampaignSpendRow};
pub use attribution_runs::{
    complete_attribution_run, create_attribution_run, fail_attribution_run, get_attribution_run,
    list_attribution_runs, start_attribution_run, AttributionRunRow,
};
pub use campaign_links::{
    list_active_campaign_links, list_organizations_with_active_links, CampaignLinkRow,
};
pub use conversions::{
    list_recent_conversions, replace_conversions, ConversionRow, NewConversion,
};
pub use orders::{list_orders_in_window, OrderItemRow, OrderRow, OrderWithItems};
pub use products::{list_product_roas, ProductRoasRow};
