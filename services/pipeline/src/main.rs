//! Ocean feature-extraction pipeline entry point.
//!
//! Builds the task cross-product for the requested dates, runs the
//! batch, and reports per-task outcomes. The process exits zero even
//! when individual tasks fail; callers inspect the logs or the output
//! directory for per-task status.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use clap::Parser;
use grid_standardize::{LandMasker, LandPolygons};
use grid_store::{CleanupSweeper, GridStore};
use ocean_common::{RegionCatalog, SourceCatalog};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pipeline::orchestrator::build_tasks;
use pipeline::{LocalDirAcquisition, Orchestrator, PipelineConfig, RetryPolicy};

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "Ocean grid feature-extraction pipeline")]
struct Args {
    /// Pipeline configuration file
    #[arg(long, env = "PIPELINE_CONFIG", default_value = "config/pipeline.yaml")]
    config: PathBuf,

    /// Date to process (YYYY-MM-DD); defaults to yesterday
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Number of consecutive dates to process, ending at --date
    #[arg(long, default_value = "1")]
    days: u32,

    /// Restrict the run to one region id
    #[arg(long)]
    region: Option<String>,

    /// Restrict the run to one dataset id
    #[arg(long)]
    dataset: Option<String>,

    /// Directory of staged raw files for acquisition
    #[arg(long, env = "STAGING_DIR", default_value = "staging")]
    staging_dir: PathBuf,

    /// Run the retention cleanup sweep before processing
    #[arg(long)]
    cleanup: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting ocean feature-extraction pipeline");

    let config = PipelineConfig::load(&args.config)?;
    let sources = SourceCatalog::load(&config.sources_file)
        .with_context(|| format!("loading {}", config.sources_file.display()))?;
    let regions = RegionCatalog::load(&config.regions_file)
        .with_context(|| format!("loading {}", config.regions_file.display()))?;

    let store = Arc::new(GridStore::new(
        &config.data_dir,
        &config.output_dir,
        config.raw_ttl(),
        std::time::Duration::from_secs(config.retention_days * 24 * 3600),
    )?);

    if args.cleanup {
        let sweeper = CleanupSweeper::new(config.retention());
        let removed = sweeper.sweep(&[store.data_dir(), store.output_dir()])?;
        info!(removed, "Retention cleanup finished");
    }

    let masker = match &config.land_file {
        Some(path) => {
            let land = LandPolygons::load(path)?;
            Arc::new(LandMasker::new(land))
        }
        None => {
            warn!("No land geometry configured; masking nothing");
            Arc::new(LandMasker::all_ocean())
        }
    };

    let end_date = args
        .date
        .unwrap_or_else(|| (Utc::now() - ChronoDuration::days(1)).date_naive());
    let dates: Vec<NaiveDate> = (0..args.days.max(1) as i64)
        .filter_map(|back| end_date.checked_sub_signed(ChronoDuration::days(back)))
        .collect();

    let orchestrator = Orchestrator::new(
        sources.clone(),
        regions.clone(),
        store,
        masker,
        Arc::new(LocalDirAcquisition::new(&args.staging_dir)),
        RetryPolicy::from_config(&config.retry),
        config.max_concurrent,
    );

    let mut tasks = build_tasks(&sources, &regions, &dates);
    if let Some(region) = &args.region {
        tasks.retain(|t| &t.region_id == region);
    }
    if let Some(dataset) = &args.dataset {
        tasks.retain(|t| &t.dataset_id == dataset);
    }
    if tasks.is_empty() {
        warn!("No tasks to run after filtering");
        return Ok(());
    }

    let reports = orchestrator.run_batch(tasks).await;
    for report in reports.iter().filter(|r| !r.is_success()) {
        warn!(task = %report.task, error = report.error().unwrap_or(""), "Task did not complete");
    }

    let succeeded = reports.iter().filter(|r| r.is_success()).count();
    info!(
        total = reports.len(),
        succeeded,
        failed = reports.len() - succeeded,
        "Pipeline run finished"
    );
    Ok(())
}
