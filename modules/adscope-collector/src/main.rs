use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adscope_collector::{Orchestrator, RunParams, Scheduler, ScraperSet};
use adscope_common::{BatchRunStatus, Config, RunMode, RunReport, TriggerType};

#[derive(Parser)]
#[command(name = "adscope-collector", about = "Ad transparency batch collector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one batch collection pass and print the run summary as JSON.
    RunBatch {
        /// Scrape a single domain instead of the configured brand sources.
        #[arg(long)]
        domain: Option<String>,

        /// Resolve and print the target list without scraping.
        #[arg(long)]
        dry_run: bool,

        #[arg(long, default_value = "manual")]
        trigger_type: TriggerType,

        #[arg(long, default_value = "full")]
        mode: RunMode,
    },
    /// Run the scheduler daemon (incremental every N hours + weekly full).
    Daemon {
        #[arg(long)]
        incremental_hours: Option<u32>,

        #[arg(long)]
        full_day: Option<String>,

        #[arg(long)]
        full_hour: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    let pool = adscope_store::connect(&config.database_url).await?;
    adscope_store::migrate(&pool).await?;

    let orchestrator = Arc::new(Orchestrator::new(
        pool,
        ScraperSet::from_config(&config),
        config.batch_concurrency,
    ));

    match cli.command {
        Command::RunBatch {
            domain,
            dry_run,
            trigger_type,
            mode,
        } => {
            let params = RunParams {
                trigger_type,
                domain,
                mode,
                dry_run,
            };

            let report = tokio::select! {
                result = orchestrator.run_batch(params) => result?,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupt received, marking active run as failed");
                    orchestrator.abort_active_run().await;
                    std::process::exit(130);
                }
            };

            println!("{}", serde_json::to_string_pretty(&report)?);

            // A completed run exits 0 even with per-target errors; only a
            // run that finalized as failed is an unrecoverable outcome.
            if let RunReport::Summary(summary) = &report {
                if summary.status == BatchRunStatus::Failed {
                    std::process::exit(1);
                }
            }
        }
        Command::Daemon {
            incremental_hours,
            full_day,
            full_hour,
        } => {
            let scheduler = Scheduler::new(
                orchestrator.clone(),
                incremental_hours.unwrap_or(config.batch_incremental_hours),
                full_day.as_deref().unwrap_or(&config.batch_full_day),
                full_hour.unwrap_or(config.batch_full_hour),
            );

            tokio::select! {
                result = scheduler.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, shutting down scheduler");
                    orchestrator.abort_active_run().await;
                }
            }
        }
    }

    Ok(())
}
