//! Configuration management.
//!
//! Provides the datastore layout, batch parameters and training export
//! settings shared by the ingestion pipeline, the record generator and
//! the CLI workflow.

use crate::constants::{
    CHECKPOINT_FILE_NAME, DATABASE_FILE_NAME, DATASTORE_DIR, DEFAULT_BATCH_SIZE,
    DEFAULT_CHUNK_SIZE, DEFAULT_POS_RESP_RATE, RAW_DIR_NAME, SIM_DIR_NAME, TEMPLATES_DIR_NAME,
    TRAIN_DIR_NAME, TRAINING_FILE_NAME, columns,
};
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// How a zero population is handled when deriving the donor fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ZeroPopulationPolicy {
    /// Emit NaN and let downstream consumers decide
    #[default]
    Nan,
    /// Abort the export with `SimError::DivisionByZero`
    Fail,
}

/// Training export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExportConfig {
    /// Identifier and raw-total columns removed before export
    pub drop_columns: Vec<String>,

    /// Numerator of the derived ratio
    pub donors_column: String,

    /// Denominator of the derived ratio
    pub population_column: String,

    /// Name of the derived ratio column
    pub ratio_column: String,

    /// Zero denominator handling
    pub zero_population: ZeroPopulationPolicy,
}

impl Default for TrainingExportConfig {
    fn default() -> Self {
        Self {
            drop_columns: vec![
                columns::ID.to_string(),
                columns::BLOCK_GEOID.to_string(),
                columns::TOTAL_DONORS.to_string(),
                columns::DONATION_TOTAL.to_string(),
            ],
            donors_column: columns::TOTAL_DONORS.to_string(),
            population_column: columns::TOTAL_POP.to_string(),
            ratio_column: columns::DONOR_FRACTION.to_string(),
            zero_population: ZeroPopulationPolicy::Nan,
        }
    }
}

/// Global configuration for the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Root of the datastore tree
    pub datastore_dir: PathBuf,

    /// Rows per ingestion chunk
    pub chunk_size: usize,

    /// Rows per generator window
    pub batch_size: u64,

    /// Fraction of calls generated as positive responses
    pub pos_resp_rate: f64,

    /// Number of samples to generate (defaults to full table)
    pub num_samples: Option<u64>,

    /// Seed for call sampling; unseeded runs are not reproducible
    pub seed: Option<u64>,

    /// Drive indicatif progress bars
    pub show_progress: bool,

    /// Training export settings
    pub training: TrainingExportConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            datastore_dir: PathBuf::from(DATASTORE_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            pos_resp_rate: DEFAULT_POS_RESP_RATE,
            num_samples: None,
            seed: None,
            show_progress: false,
            training: TrainingExportConfig::default(),
        }
    }
}

impl SimConfig {
    /// Use a different datastore root
    pub fn with_datastore_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.datastore_dir = dir.into();
        self
    }

    /// Set rows per ingestion chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set rows per generator window
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the positive response rate
    pub fn with_pos_resp_rate(mut self, rate: f64) -> Self {
        self.pos_resp_rate = rate;
        self
    }

    /// Limit the number of generated samples
    pub fn with_num_samples(mut self, num_samples: Option<u64>) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Seed the call sampler
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Enable progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Configure training export settings
    pub fn with_training(mut self, training: TrainingExportConfig) -> Self {
        self.training = training;
        self
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.datastore_dir.join(RAW_DIR_NAME)
    }

    pub fn sim_dir(&self) -> PathBuf {
        self.datastore_dir.join(SIM_DIR_NAME)
    }

    pub fn train_dir(&self) -> PathBuf {
        self.datastore_dir.join(TRAIN_DIR_NAME)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.datastore_dir.join(TEMPLATES_DIR_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.sim_dir().join(DATABASE_FILE_NAME)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.sim_dir().join(CHECKPOINT_FILE_NAME)
    }

    pub fn training_path(&self) -> PathBuf {
        self.train_dir().join(TRAINING_FILE_NAME)
    }

    /// Reject parameter combinations no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SimError::invalid_argument(
                "chunk_size",
                "must be at least 1",
            ));
        }
        if self.batch_size == 0 {
            return Err(SimError::invalid_argument(
                "batch_size",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.pos_resp_rate) {
            return Err(SimError::invalid_argument(
                "pos_resp_rate",
                format!("{} is outside [0, 1]", self.pos_resp_rate),
            ));
        }

        debug!(
            "Configuration validated: chunk_size={}, batch_size={}, pos_resp_rate={}",
            self.chunk_size, self.batch_size, self.pos_resp_rate
        );
        Ok(())
    }
}
