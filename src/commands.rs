//! Workflow orchestration for the command-line tool.
//!
//! Maps `--recreate` onto the pipeline steps: ingest the raw file, build
//! the simulator tables, generate calls and export the training extract.
//! The steps are blocking and run on a tokio blocking thread.

use crate::checkpoint::JsonCheckpointStore;
use crate::cli::{Args, Recreate};
use crate::column_map::import_column_map;
use crate::config::SimConfig;
use crate::constants::tables;
use crate::database::{SimDatabase, raw_table_name};
use crate::donations::DonationTransform;
use crate::generator::RecordGenerator;
use crate::header::read_manual_header;
use crate::models::IngestStats;
use crate::processor::IngestionPipeline;

use anyhow::{Context, Result};
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone)]
pub struct WorkflowSummary {
    pub rows_ingested: u64,
    pub chunks_skipped: u64,
    pub cenblocks: u64,
    pub voters: u64,
    pub calls_written: u64,
    pub positive_calls: u64,
    pub training_rows: u64,
    pub training_path: Option<PathBuf>,
    pub elapsed_ms: u128,
}

/// Entry point for the binary
pub async fn run(args: Args) -> Result<WorkflowSummary> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config = args.to_config();
    config.validate()?;

    let summary = tokio::task::spawn_blocking(move || run_workflow(&args, &config))
        .await
        .context("Workflow task failed")??;

    print_summary(&summary);
    Ok(summary)
}

pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("callcenter_sim={}", log_level)));

    let result = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.context("Failed to install logging subscriber")
}

/// Run every step selected by `--recreate`
pub fn run_workflow(args: &Args, config: &SimConfig) -> Result<WorkflowSummary> {
    let start_time = Instant::now();
    let mut summary = WorkflowSummary::default();

    if args.recreate == Recreate::N {
        println!("{}", "Nothing to recreate (use --recreate)".bright_yellow());
        return Ok(summary);
    }

    println!("{}", "Building simulated call-center data".bright_green().bold());
    println!(
        "  {} {}",
        "Datastore:".bright_cyan(),
        config.datastore_dir.display()
    );
    println!("  {} {:?}", "Recreate:".bright_cyan(), args.recreate);

    setup_dirs(config, args.recreate.ingests() && !args.resume)?;
    let db = SimDatabase::open(&config.database_path())
        .with_context(|| format!("Failed to open {}", config.database_path().display()))?;

    if args.recreate.ingests() || args.recreate.builds_tables() {
        let raw_file = resolve_raw_file(args.raw_file.as_deref(), &config.raw_dir())?;
        let raw_table = raw_table_name(&raw_file);
        println!("  {} {}", "Raw file:".bright_cyan(), raw_file.display());

        if args.recreate.ingests() {
            println!("\n{}", "Ingesting raw data...".bright_yellow());
            let stats = ingest(args, config, &db, &raw_file, &raw_table)?;
            summary.rows_ingested = stats.rows_written;
            summary.chunks_skipped = stats.chunks_skipped;
        }

        if args.recreate.builds_tables() {
            println!("\n{}", "Building tables...".bright_yellow());
            db.recreate_tables()?;
            let built = db.build_out(&raw_table)?;
            summary.cenblocks = built.cenblocks;
            summary.voters = built.voters;
        }
    }

    let mut generator = RecordGenerator::new(config);

    if args.recreate.generates_calls() {
        println!("\n{}", "Generating simulated calls...".bright_yellow());
        let cleared = db.clear_table(tables::CALLS)?;
        debug!("Removed {} existing calls", cleared);
        let stats = generator.generate_events(
            &db.table(tables::VOTERS),
            &mut db.calls(),
            config.pos_resp_rate,
            config.num_samples,
            config.batch_size,
        )?;
        summary.calls_written = stats.records_written;
        summary.positive_calls = stats.positives;
    }

    if args.recreate.exports_training() {
        println!("\n{}", "Exporting training data...".bright_yellow());
        let output = config.training_path();
        let stats = generator.export_training(
            &db.table(tables::CENBLOCKS),
            &output,
            config.num_samples,
            config.batch_size,
        )?;
        summary.training_rows = stats.records_written;
        summary.training_path = stats.output_path;
    }

    summary.elapsed_ms = start_time.elapsed().as_millis();
    info!("Workflow complete in {}ms", summary.elapsed_ms);
    Ok(summary)
}

fn ingest(
    args: &Args,
    config: &SimConfig,
    db: &SimDatabase,
    raw_file: &Path,
    raw_table: &str,
) -> Result<IngestStats> {
    let ignored = match &args.col_map {
        Some(location) => {
            let map = import_column_map(location, &HashMap::new())
                .with_context(|| format!("Failed to import column map {}", location.display()))?;
            Some(map.ignored().to_vec())
        }
        None => None,
    };

    let store = JsonCheckpointStore::new(config.checkpoint_path());
    let mut pipeline =
        IngestionPipeline::new(DonationTransform::new(), store)?.with_progress(config.show_progress);
    if let Some(template) = &args.manual_header {
        pipeline = pipeline.with_manual_header(load_manual_header(template, &config.templates_dir())?);
    }

    let mut sink = db.raw_table(raw_table);
    let stats = pipeline
        .execute(raw_file, config.chunk_size, &mut sink, ignored.as_deref())
        .with_context(|| format!("Failed to ingest {}", raw_file.display()))?;
    Ok(stats)
}

/// Create the simulator and training directories, wiping them first when
/// `wipe` is set
pub fn setup_dirs(config: &SimConfig, wipe: bool) -> Result<()> {
    for dir in [config.sim_dir(), config.train_dir()] {
        if wipe && dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            debug!("Removed {}", dir.display());
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// The raw file to build from: an explicit path, a name inside `raw_dir`,
/// or the alphabetically first CSV in `raw_dir`
pub fn resolve_raw_file(raw_file: Option<&Path>, raw_dir: &Path) -> Result<PathBuf> {
    if let Some(requested) = raw_file {
        if requested.exists() {
            return Ok(requested.to_path_buf());
        }
        let in_raw_dir = raw_dir.join(requested);
        if in_raw_dir.exists() {
            return Ok(in_raw_dir);
        }
        anyhow::bail!(
            "Raw file {} not found (also looked in {})",
            requested.display(),
            raw_dir.display()
        );
    }

    let pattern = raw_dir.join("*.csv");
    let pattern = pattern.to_string_lossy();
    let mut candidates: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid raw file pattern {}", pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .with_context(|| format!("No raw CSV files found in {}", raw_dir.display()))
}

/// Read a header template by path or by name inside `templates_dir`
pub fn load_manual_header(template: &Path, templates_dir: &Path) -> Result<Vec<String>> {
    let path = if template.exists() {
        template.to_path_buf()
    } else {
        templates_dir.join(template)
    };
    read_manual_header(&path)
        .with_context(|| format!("Failed to read header template {}", path.display()))
}

fn print_summary(summary: &WorkflowSummary) {
    println!("\n{}", "Summary".bright_green().bold());
    println!(
        "  {} {} ({} chunks resumed)",
        "Rows ingested:".bright_cyan(),
        summary.rows_ingested.to_string().bright_white().bold(),
        summary.chunks_skipped
    );
    println!(
        "  {} {} census blocks, {} voters",
        "Tables built:".bright_cyan(),
        summary.cenblocks.to_string().bright_white().bold(),
        summary.voters.to_string().bright_white().bold()
    );
    println!(
        "  {} {} ({} positive)",
        "Calls written:".bright_cyan(),
        summary.calls_written.to_string().bright_white().bold(),
        summary.positive_calls
    );
    match &summary.training_path {
        Some(path) => println!(
            "  {} {} -> {}",
            "Training rows:".bright_cyan(),
            summary.training_rows.to_string().bright_white().bold(),
            path.display()
        ),
        None => println!("  {} 0", "Training rows:".bright_cyan()),
    }
    println!(
        "  {} {:.2}s",
        "Elapsed:".bright_cyan(),
        summary.elapsed_ms as f64 / 1000.0
    );
}
