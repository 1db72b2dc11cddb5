//! Command-line interface components.

use crate::config::SimConfig;
use crate::constants::{DATASTORE_DIR, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_POS_RESP_RATE};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which parts of the simulated database to rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Recreate {
    /// Ingest the raw file and rebuild everything
    All,
    /// Rebuild tables from the already ingested raw table
    Db,
    /// Regenerate the simulated calls
    Call,
    /// Regenerate the training extract
    Train,
    /// Do nothing
    N,
}

impl Recreate {
    pub fn ingests(self) -> bool {
        self == Recreate::All
    }

    pub fn builds_tables(self) -> bool {
        matches!(self, Recreate::All | Recreate::Db)
    }

    pub fn generates_calls(self) -> bool {
        matches!(self, Recreate::All | Recreate::Call)
    }

    pub fn exports_training(self) -> bool {
        matches!(self, Recreate::All | Recreate::Train)
    }
}

#[derive(Parser, Debug)]
#[command(name = "callcenter_sim")]
#[command(about = "Build a simulated call-center database from raw voter data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Raw file to build from (default: first CSV in the raw data directory)
    #[arg(short = 'r', long, value_name = "FILE")]
    pub raw_file: Option<PathBuf>,

    /// Parts of the simulated database to create from scratch
    #[arg(short = 'c', long, value_enum, default_value = "n")]
    pub recreate: Recreate,

    /// Rows per generator window
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    /// Rows per ingestion chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Number of call/census samples to generate (default: every row)
    #[arg(short, long)]
    pub num_samples: Option<u64>,

    /// Fraction of calls generated as positive responses
    #[arg(short, long, default_value_t = DEFAULT_POS_RESP_RATE)]
    pub pos_resp_rate: f64,

    /// Header template in the templates directory, for raw files without a header row
    #[arg(short, long, value_name = "FILE")]
    pub manual_header: Option<PathBuf>,

    /// Root of the datastore tree
    #[arg(long, default_value = DATASTORE_DIR)]
    pub datastore: PathBuf,

    /// Column map file, or a directory holding col_map.csv; ignored columns are not ingested
    #[arg(long, value_name = "PATH")]
    pub col_map: Option<PathBuf>,

    /// Seed for call sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep the existing checkpoint and database when recreating everything
    #[arg(long)]
    pub resume: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Configuration described by these arguments
    pub fn to_config(&self) -> SimConfig {
        SimConfig::default()
            .with_datastore_dir(&self.datastore)
            .with_chunk_size(self.chunk_size)
            .with_batch_size(self.batch_size)
            .with_pos_resp_rate(self.pos_resp_rate)
            .with_num_samples(self.num_samples)
            .with_seed(self.seed)
            .with_progress(!self.quiet)
    }
}
