//! Batched record generation.
//!
//! Streams rows out of a relational source in fixed-size id windows and
//! derives call events and training extracts from them. Only one window
//! is held in memory at a time; each window's output is committed before
//! the next window is read, so a failure in window `i` leaves windows
//! before `i` in place.

pub mod events;
pub mod training;

#[cfg(test)]
pub mod tests;

use crate::config::{SimConfig, TrainingExportConfig};
use crate::error::{Result, SimError};
use crate::models::{BatchWindow, CallEvent, Frame};
use crate::planner::plan;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

/// Rows addressable by a contiguous 1-based id
pub trait RowSource {
    /// Total rows available
    fn row_count(&self) -> Result<u64>;

    /// Rows with `start_id <= id <= end_id`, in id order
    fn read_window(&self, window: &BatchWindow) -> Result<Frame>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Destination for generated call events
pub trait EventSink {
    /// Write one window's events as a single atomic unit
    fn write_events(&mut self, window: &BatchWindow, events: &[CallEvent]) -> Result<u64>;
}

/// Resolve the number of rows to process and validate the batch size
pub(crate) fn resolve_total<S: RowSource + ?Sized>(
    source: &S,
    total_count: Option<u64>,
    batch_size: u64,
) -> Result<u64> {
    if batch_size < 1 {
        return Err(SimError::invalid_argument("batch_size", "must be at least 1"));
    }
    match total_count {
        Some(total) => Ok(total),
        None => source.row_count(),
    }
}

/// Iterates `(window, rows)` pairs over a source
pub struct WindowedReader<'a, S: RowSource + ?Sized> {
    source: &'a S,
    windows: std::vec::IntoIter<BatchWindow>,
}

impl<'a, S: RowSource + ?Sized> WindowedReader<'a, S> {
    /// Plan windows over `[1, total_count]`; the source row count is used
    /// when `total_count` is `None`
    pub fn new(source: &'a S, total_count: Option<u64>, batch_size: u64) -> Result<Self> {
        let total = resolve_total(source, total_count, batch_size)?;
        let windows = plan(total, batch_size)?;
        debug!(
            "Planned {} windows of up to {} rows over {}",
            windows.len(),
            batch_size,
            source.describe()
        );
        Ok(Self {
            source,
            windows: windows.into_iter(),
        })
    }

    /// Windows not yet read
    pub fn remaining(&self) -> usize {
        self.windows.len()
    }
}

impl<S: RowSource + ?Sized> Iterator for WindowedReader<'_, S> {
    type Item = Result<(BatchWindow, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.next()?;
        Some(self.source.read_window(&window).map(|frame| (window, frame)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

/// Generates call events and training extracts from windowed sources
#[derive(Debug)]
pub struct RecordGenerator {
    rng: StdRng,
    training: TrainingExportConfig,
    show_progress: bool,
}

impl RecordGenerator {
    /// Create a generator; a configured seed makes call sampling
    /// reproducible
    pub fn new(config: &SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            training: config.training.clone(),
            show_progress: config.show_progress,
        }
    }

    pub fn training_config(&self) -> &TrainingExportConfig {
        &self.training
    }

    fn progress_bar(&self, windows: usize, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(windows as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(message);
        pb
    }
}
