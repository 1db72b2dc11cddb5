//! Call Center Simulator Library
//!
//! Prepares large voter and census extracts for a simulated call-center
//! database and derives synthetic call and training datasets from it.
//!
//! This library provides tools for:
//! - Chunked, checkpointed ingestion of raw CSV extracts that resumes
//!   after interruption without redoing completed chunks
//! - Batched generation of call events and training extracts over
//!   fixed-size id windows of a relational source
//! - SQL statement building and SQLite build-out of the simulator tables
//! - Column map import for semantic column groups

pub mod checkpoint;
pub mod cli;
pub mod column_map;
pub mod commands;
pub mod config;
pub mod constants;
pub mod database;
pub mod donations;
pub mod error;
pub mod generator;
pub mod header;
pub mod models;
pub mod planner;
pub mod processor;
pub mod schema;
pub mod sql;

pub use checkpoint::{CheckpointStore, JsonCheckpointStore};
pub use column_map::{ColumnMap, import_column_map};
pub use config::{SimConfig, TrainingExportConfig, ZeroPopulationPolicy};
pub use database::SimDatabase;
pub use error::{Result, SimError};
pub use generator::{EventSink, RecordGenerator, RowSource, WindowedReader};
pub use models::{BatchWindow, CallEvent, Checkpoint, Frame, Value};
pub use planner::plan;
pub use processor::IngestionPipeline;
pub use processor::sink::{ChunkSink, CsvFileSink};
pub use processor::transform::ChunkTransform;
