use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "attrib-cli")]
#[command(about = "Attribution service command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one attribution pass for an organization.
    Run {
        #[arg(long)]
        organization_id: Uuid,
        /// Lookback window in days (default 7). Negative values are rejected.
        #[arg(long)]
        days_back: Option<i64>,
    },
    /// Show recent attribution runs for an organization.
    Runs {
        #[arg(long)]
        organization_id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show per-product ROAS aggregates from the latest run.
    Summary {
        #[arg(long)]
        organization_id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = attrib_db::connect_pool_from_env().await?;

    match cli.command {
        Commands::Run {
            organization_id,
            days_back,
        } => {
            let days_back = attrib_engine::validate_days_back(days_back)?;
            let outcome =
                attrib_engine::run_attribution(&pool, organization_id, days_back, "cli").await?;
            println!(
                "run {}: {} ({} conversions, {} orders)",
                outcome.run_public_id,
                outcome.message,
                outcome.attributed,
                outcome.orders_processed
            );
        }
        Commands::Runs {
            organization_id,
            limit,
        } => {
            let runs = attrib_db::list_attribution_runs(&pool, organization_id, limit).await?;
            if runs.is_empty() {
                println!("no attribution runs for {organization_id}");
            }
            for run in runs {
                println!(
                    "{}  {:9}  {} .. {}  conversions={} orders={} spend={} revenue={}{}",
                    run.public_id,
                    run.status,
                    run.window_start,
                    run.window_end,
                    run.conversions_generated,
                    run.orders_processed,
                    run.total_attributed_spend,
                    run.total_attributed_revenue,
                    run.error_message
                        .map(|e| format!("  error: {e}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Summary {
            organization_id,
            limit,
        } => {
            let rows = attrib_db::list_product_roas(&pool, organization_id, limit).await?;
            if rows.is_empty() {
                println!("no products for {organization_id}");
            }
            for row in rows {
                println!(
                    "{:24}  spend={:>10}  revenue={:>10}  roas={:>8}  {}",
                    row.sku, row.total_attributed_spend, row.total_attributed_revenue,
                    row.attributed_roas, row.name
                );
            }
        }
    }

    Ok(())
}
