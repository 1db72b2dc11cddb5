//! Pipeline scenario tests
//!
//! Exercise ingestion end to end against temporary raw files, a JSON
//! checkpoint and in-memory sinks.

pub mod basic_ingestion;
pub mod resume;

use crate::error::{Result, SimError};
use crate::models::Frame;
use crate::processor::sink::ChunkSink;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Sink that keeps every written chunk
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub chunks: Vec<Frame>,
    /// Fail on this write (1-based) when set
    pub fail_on_write: Option<usize>,
}

impl RecordingSink {
    pub fn failing_on(write: usize) -> Self {
        Self {
            chunks: Vec::new(),
            fail_on_write: Some(write),
        }
    }
}

impl ChunkSink for RecordingSink {
    fn write_chunk(&mut self, _index: u64, chunk: &Frame) -> Result<u64> {
        if self.fail_on_write == Some(self.chunks.len() + 1) {
            return Err(SimError::sink_write("recording sink", "disk full"));
        }
        self.chunks.push(chunk.clone());
        Ok(chunk.len() as u64)
    }

    fn describe(&self) -> String {
        "recording sink".to_string()
    }
}

/// Write a raw CSV with an `ID Number` column and `rows` data rows
pub fn write_raw_file(dir: &TempDir, rows: usize) -> PathBuf {
    let mut content = String::from("ID Number,First Name,Score\n");
    for i in 1..=rows {
        content.push_str(&format!("{},name{},{}\n", i, i, i * 10));
    }
    let path = dir.path().join("raw.csv");
    fs::write(&path, content).unwrap();
    path
}

pub fn checkpoint_path(dir: &TempDir) -> PathBuf {
    dir.path().join("sim_db").join("prep_cache.json")
}
