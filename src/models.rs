//! Core data structures shared by the pipelines.
//!
//! Defines typed cell values, the column-indexed `Frame` that carries
//! chunks and windows between stages, batch windows, the ingestion
//! checkpoint and the statistics returned by each run.

use crate::error::{Result, SimError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// A single typed cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Infer a value from a raw CSV field: empty is null, then integer,
    /// then float, otherwise text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        // "nan"/"inf" parse as f64; only digit-bearing fields are numbers
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Value::Real(f);
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// SQLite column affinity used when a sink creates its table
    pub fn sql_type(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "FLOAT",
            Value::Text(_) | Value::Null => "VARCHAR",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

/// Ordered named columns with rows of typed values.
///
/// Column names are unique and every row has exactly one value per
/// column; both are checked on construction and on every mutation so
/// lookups by name never need revalidating.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty frame with the given header
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if positions.insert(name.clone(), i).is_some() {
                return Err(SimError::schema(
                    "frame header",
                    format!("duplicate column `{}`", name),
                ));
            }
        }
        Ok(Self {
            columns,
            positions,
            rows: Vec::new(),
        })
    }

    /// Create a frame and populate it with rows
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut frame = Self::new(columns)?;
        frame.rows.reserve(rows.len());
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Position of a column that must exist
    pub fn require(&self, name: &str) -> Result<usize> {
        self.position(name).ok_or_else(|| {
            SimError::schema("frame", format!("missing required column `{}`", name))
        })
    }

    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(SimError::schema(
                "frame row",
                format!(
                    "row {} has {} values, header has {} columns",
                    self.rows.len() + 1,
                    values.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(values);
        Ok(())
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            frame: self,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            frame: self,
            values,
        })
    }

    /// Values of one column in row order
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let pos = self.require(name)?;
        Ok(self.rows.iter().map(|row| &row[pos]).collect())
    }

    /// Append a column, or replace it if the name already exists
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(SimError::schema(
                "frame",
                format!(
                    "column `{}` has {} values for {} rows",
                    name,
                    values.len(),
                    self.rows.len()
                ),
            ));
        }

        match self.position(name) {
            Some(pos) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[pos] = value;
                }
            }
            None => {
                self.positions.insert(name.to_string(), self.columns.len());
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Rewrite every value of an existing column in place
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Value) -> Value,
    {
        let pos = self.require(name)?;
        for row in &mut self.rows {
            row[pos] = f(&row[pos]);
        }
        Ok(())
    }

    /// Remove the named columns; names not present are ignored.
    /// Returns how many columns were removed.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut keep: Vec<bool> = vec![true; self.columns.len()];
        for name in names {
            if let Some(pos) = self.position(name.as_ref()) {
                keep[pos] = false;
            }
        }
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        let columns = std::mem::take(&mut self.columns);
        self.columns = columns
            .into_iter()
            .zip(&keep)
            .filter_map(|(name, k)| k.then_some(name))
            .collect();
        for row in &mut self.rows {
            let values = std::mem::take(row);
            *row = values
                .into_iter()
                .zip(&keep)
                .filter_map(|(value, k)| k.then_some(value))
                .collect();
        }
        self.positions = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        removed
    }

    /// Replace the header positionally
    pub fn rename_columns(&mut self, header: Vec<String>) -> Result<()> {
        if header.len() != self.columns.len() {
            return Err(SimError::schema(
                "frame header",
                format!(
                    "header has {} names for {} columns",
                    header.len(),
                    self.columns.len()
                ),
            ));
        }
        let renamed = Frame::new(header)?;
        self.columns = renamed.columns;
        self.positions = renamed.positions;
        Ok(())
    }
}

/// Borrowed view of one frame row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    frame: &'a Frame,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.frame.position(name).map(|pos| &self.values[pos])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

/// Contiguous id range read from a relational source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchWindow {
    pub start_id: u64,
    pub end_id: u64,
    /// 1-based position in the plan
    pub index: u64,
}

impl BatchWindow {
    /// Number of ids covered (inclusive range)
    pub fn len(&self) -> u64 {
        self.end_id - self.start_id + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end_id < self.start_id
    }
}

/// Durable record of ingestion progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Header frozen on the first processed chunk
    pub header: Option<Vec<String>>,

    /// Chunks fully transformed, written and recorded
    pub chunks_completed: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Whether 1-based chunk `chunk` was finished by an earlier run
    pub fn is_completed(&self, chunk: u64) -> bool {
        chunk <= self.chunks_completed
    }

    /// Advance past a successfully written chunk
    pub fn record_chunk(&mut self) {
        self.chunks_completed += 1;
        self.updated_at = Some(Utc::now());
    }
}

/// One simulated call outcome
#[derive(Debug, Clone, PartialEq)]
pub struct CallEvent {
    pub voter_key: Value,
    /// 1 for a positive response, 0 otherwise
    pub call_result: i64,
}

/// Ingestion run statistics
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub chunks_processed: u64,
    pub chunks_skipped: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub processing_time_ms: u128,
}

/// Generator run statistics
#[derive(Debug, Default, Clone)]
pub struct GenerationStats {
    pub windows_processed: u64,
    pub rows_read: u64,
    pub records_written: u64,
    pub positives: u64,
    pub output_path: Option<PathBuf>,
    pub processing_time_ms: u128,
}

impl GenerationStats {
    /// Achieved positive fraction across all windows
    pub fn positive_fraction(&self) -> f64 {
        if self.records_written == 0 {
            return 0.0;
        }
        self.positives as f64 / self.records_written as f64
    }
}
