//! Sequential chunk reader for raw CSV extracts.
//!
//! Reads at most `chunk_size` records per call so memory stays bounded by
//! the chunk, not the file. Records are kept as raw strings until a chunk
//! is actually processed; skipped chunks are never typed.

use crate::error::{Result, SimError};
use crate::models::{Frame, Value};
use csv::StringRecord;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One window of raw records
#[derive(Debug)]
pub struct RawChunk {
    /// 1-based chunk index
    pub index: u64,
    records: Vec<StringRecord>,
}

impl RawChunk {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Type the records under `header`, applied by position
    pub fn into_frame(self, header: &[String]) -> Result<Frame> {
        let mut frame = Frame::new(header.to_vec())?;
        for (offset, record) in self.records.iter().enumerate() {
            if record.len() != header.len() {
                return Err(SimError::schema(
                    format!("chunk {}", self.index),
                    format!(
                        "record {} has {} fields, header has {} columns",
                        offset + 1,
                        record.len(),
                        header.len()
                    ),
                ));
            }
            frame.push_row(record.iter().map(Value::infer).collect())?;
        }
        Ok(frame)
    }
}

/// Streams a CSV file in fixed-size record windows
pub struct ChunkReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    raw_header: Vec<String>,
    chunk_size: usize,
    next_index: u64,
}

impl ChunkReader {
    /// Open `path`. With `manual_header` the file is read as headerless and
    /// every row is data.
    pub fn open(path: &Path, chunk_size: usize, manual_header: Option<Vec<String>>) -> Result<Self> {
        if chunk_size < 1 {
            return Err(SimError::invalid_argument("chunk_size", "must be at least 1"));
        }
        if !path.exists() {
            return Err(SimError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(manual_header.is_none())
            .flexible(true)
            .from_path(path)?;

        let raw_header = match manual_header {
            Some(header) => header,
            None => reader.headers()?.iter().map(str::to_string).collect(),
        };
        debug!(
            "Opened {} with {} columns, chunk size {}",
            path.display(),
            raw_header.len(),
            chunk_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            raw_header,
            chunk_size,
            next_index: 1,
        })
    }

    /// Header as found in the file (or the manual header)
    pub fn raw_header(&self) -> &[String] {
        &self.raw_header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index the next chunk will carry
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Read the next window; `None` at end of input
    pub fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        let mut records = Vec::with_capacity(self.chunk_size.min(8192));
        let mut record = StringRecord::new();
        while records.len() < self.chunk_size && self.reader.read_record(&mut record)? {
            records.push(record.clone());
        }

        if records.is_empty() {
            return Ok(None);
        }

        let chunk = RawChunk {
            index: self.next_index,
            records,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }
}
