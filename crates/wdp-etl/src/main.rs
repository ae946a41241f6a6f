//! WDP ETL - Weather data pipeline binary
//!
//! Each stage is its own subcommand so a workflow scheduler can run the
//! stages as separate tasks with a linear dependency (extract → transform
//! → load); a stage failure exits non-zero so the scheduler marks the task
//! failed and withholds downstream tasks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use wdp_common::logging::{init_logging, LogConfig, LogLevel};
use wdp_etl::{
    BatchTransformer, DbConfig, EtlConfig, Extractor, FsStagingStore, PipelineOrchestrator,
    TableLoader,
};

#[derive(Parser, Debug)]
#[command(name = "wdp-etl")]
#[command(author, version, about = "Weather data ETL pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch raw observations into the staging raw zone
    Extract,

    /// Normalize pending raw observations into a new artifact
    Transform,

    /// Append the newest artifact to the weather_readings table
    Load,

    /// Run one full cycle: extract, transform, load
    Run,

    /// Run full cycles forever on the configured cadence
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("wdp-etl")?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let config = EtlConfig::load()?;
    let staging = FsStagingStore::new(&config.staging_dir);

    match cli.command {
        Command::Extract => {
            let extractor = Extractor::new(staging, config.provider)?;
            let outcome = extractor.run().await?;
            info!(fetched = outcome.fetched, "Extract stage finished");
        },
        Command::Transform => {
            let outcome = BatchTransformer::new(staging).run()?;
            info!(
                processed = outcome.processed,
                rejected = outcome.rejected,
                artifact = outcome.artifact.as_ref().map(|a| a.name.as_str()),
                "Transform stage finished"
            );
        },
        Command::Load => {
            let db = DbConfig::from_env()?;
            let outcome = TableLoader::new(staging, db).run().await?;
            info!(rows_loaded = outcome.rows_loaded, "Load stage finished");
        },
        Command::Run => {
            let outcome = PipelineOrchestrator::new(config).run_cycle().await?;
            info!(
                fetched = outcome.fetched,
                processed = outcome.processed,
                rejected = outcome.rejected,
                rows_loaded = outcome.rows_loaded,
                "Pipeline cycle finished"
            );
        },
        Command::Schedule => {
            PipelineOrchestrator::new(config).run_scheduled().await?;
        },
    }

    Ok(())
}
