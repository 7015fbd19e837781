mod api;
mod middleware;
mod scheduler;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use attrib_core::{AppConfig, Environment};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::{AuthState, RateLimitState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Arc::new(attrib_core::load_app_config()?);
    init_tracing(&config)?;

    let pool = attrib_db::connect_pool(
        &config.database_url,
        attrib_db::PoolConfig::from_app_config(&config),
    )
    .await
    .context("connecting to Postgres")?;
    attrib_db::run_migrations(&pool)
        .await
        .context("applying migrations")?;

    // The handle keeps the cron jobs alive; dropping it stops the sweeps.
    let _scheduler = scheduler::build_scheduler(pool.clone(), Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(config.env, Environment::Development))?;
    let rate_limit = RateLimitState::new(120, Duration::from_secs(60));
    let app = build_app(AppState { pool }, auth, rate_limit);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "attribution service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    // RUST_LOG wins when set; the configured level is the fallback.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Resolves on SIGINT or SIGTERM so in-flight requests can drain before exit.
async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("install ctrl-c handler");
        }
        () = sigterm => {}
    }

    tracing::info!("shutdown signal received, draining connections");
}
