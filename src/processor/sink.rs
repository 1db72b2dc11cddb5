//! Chunk sinks.
//!
//! A sink receives each prepared chunk together with its 1-based chunk
//! index. A chunk written before a crash but not yet checkpointed is
//! handed over again on resume; sinks that key rows by chunk index replace
//! the earlier write, append-only sinks see it twice. The header (or
//! table) is emitted only by the first physical write to a fresh sink.

use crate::error::{Result, SimError};
use crate::models::Frame;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for prepared ingestion chunks
pub trait ChunkSink {
    /// Append chunk `index`, returning the number of rows written
    fn write_chunk(&mut self, index: u64, chunk: &Frame) -> Result<u64>;

    /// Short description used in error messages
    fn describe(&self) -> String;
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn write_chunk(&mut self, index: u64, chunk: &Frame) -> Result<u64> {
        (**self).write_chunk(index, chunk)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Appends chunks to a CSV file.
///
/// Append-only: a chunk replayed after a crash between the write and the
/// checkpoint appears twice.
#[derive(Debug)]
pub struct CsvFileSink {
    path: PathBuf,
    header_written: bool,
}

impl CsvFileSink {
    /// A sink over `path`; an existing non-empty file is treated as
    /// already carrying its header.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let header_written = std::fs::metadata(&path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        Self {
            path,
            header_written,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSink for CsvFileSink {
    fn write_chunk(&mut self, index: u64, chunk: &Frame) -> Result<u64> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SimError::sink_write(self.describe(), e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !self.header_written {
            writer.write_record(chunk.columns())?;
        }
        for row in chunk.rows() {
            writer.write_record(row.values().iter().map(|value| value.to_string()))?;
        }
        writer.flush()?;
        self.header_written = true;

        debug!(
            "Appended chunk {} ({} rows) to {}",
            index,
            chunk.len(),
            self.path.display()
        );
        Ok(chunk.len() as u64)
    }

    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }
}
