//! Podium CLI
//!
//! Serves cached results as JSON and runs the refresh service locally.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use podium::{
    Context,
    error::{AppError, Result},
    models::Config,
    pipeline::SyncReport,
};
use serde::Serialize;

/// Podium - motor-racing results cache
#[derive(Parser, Debug)]
#[command(
    name = "podium",
    version,
    about = "Resilient cache for historical motor-racing results"
)]
struct Cli {
    /// Path to storage directory containing config.toml and durable data
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the race winners of a season
    Winners {
        /// Season, e.g. 2023
        season: i32,
    },

    /// Print every season champion from the configured start year
    Champions,

    /// Print the number of races scheduled in a season
    Details {
        /// Season, e.g. 2024
        season: i32,
    },

    /// Run one startup synchronization (with its single retry)
    Sync,

    /// Synchronize, then keep refreshing until Ctrl-C
    Run,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_sync_result(report: Option<SyncReport>) {
    match report {
        Some(r) if r.is_complete() => log::info!("Startup sync finished"),
        Some(r) => log::warn!(
            "Startup sync finished with {} year(s) unavailable",
            r.unavailable.len()
        ),
        None => log::warn!("Startup sync did not complete"),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let level = Config::load(&config_path)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = Config::load_or_default(&config_path);
    log::debug!("Storage directory: {}", cli.storage_dir.display());

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK");
        return Ok(());
    }

    let ctx = Context::from_config(config, &cli.storage_dir)?;

    match cli.command {
        Command::Winners { season } => {
            let winners = ctx.race_winners.get_race_winners(season).await?;
            log::info!("{} drivers won races in {}", winners.len(), season);
            print_json(&winners)?;
        }

        Command::Champions => {
            let champions = ctx.champions.get_season_champions().await?;
            print_json(&champions)?;
        }

        Command::Details { season } => {
            let total = ctx.season_race_count(season).await?.ok_or_else(|| {
                AppError::validation(format!("Season {season} details unavailable upstream"))
            })?;
            print_json(&serde_json::json!({ "season": season, "totalRaces": total }))?;
        }

        Command::Sync => {
            log_sync_result(ctx.synchronizer.run().await);
        }

        Command::Run => {
            let synchronizer = Arc::clone(&ctx.synchronizer);
            let sync_task = tokio::spawn(async move {
                log_sync_result(synchronizer.run().await);
            });

            let (weekly, hourly) = ctx.triggers()?;
            ctx.scheduler.start(weekly, hourly);

            log::info!("Refresh service running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            log::info!("Shutting down...");

            ctx.scheduler.stop().await;
            sync_task.abort();
        }

        // Handled before the context is built.
        Command::Validate => {}
    }

    Ok(())
}
