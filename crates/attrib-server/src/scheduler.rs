//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring attribution sweep.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Registers the recurring attribution sweep and starts the scheduler.
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<attrib_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_attribution_job(&scheduler, pool, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring attribution sweep.
///
/// Runs on the configured cron schedule (hourly by default). Each firing
/// runs the engine once per organization with active campaign links, using
/// the configured default lookback window.
async fn register_attribution_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<attrib_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let schedule = config.attribution_schedule.clone();

    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting attribution sweep");
            run_attribution_sweep(&pool, &config).await;
            tracing::info!("scheduler: attribution sweep complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Drive one attribution run for every organization with active links.
///
/// A failing organization is logged and skipped; it does not abort the rest
/// of the sweep. There is no overlap lock between firings — the
/// transactional replace inside the engine keeps concurrent runs from
/// leaving partial state.
async fn run_attribution_sweep(pool: &PgPool, config: &attrib_core::AppConfig) {
    let organizations = match attrib_db::list_organizations_with_active_links(pool).await {
        Ok(orgs) => orgs,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list organizations with active links");
            return;
        }
    };

    if organizations.is_empty() {
        tracing::info!("scheduler: no organizations with active campaign links; skipping");
        return;
    }

    tracing::info!(
        count = organizations.len(),
        "scheduler: running attribution for organizations"
    );

    for organization_id in organizations {
        match attrib_engine::run_attribution(
            pool,
            organization_id,
            config.attribution_days_back,
            "scheduler",
        )
        .await
        {
            Ok(outcome) => {
                tracing::info!(
                    organization_id = %organization_id,
                    attributed = outcome.attributed,
                    orders = outcome.orders_processed,
                    "scheduler: attribution run finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    organization_id = %organization_id,
                    error = %e,
                    "scheduler: attribution run failed; continuing with next organization"
                );
            }
        }
    }
}
