//! Chunked, checkpointed ingestion pipeline.
//!
//! Reads a raw extract sequentially in bounded chunks, applies an opaque
//! transform to each chunk, appends the result to a sink and records the
//! chunk as complete in a durable checkpoint. A rerun skips every chunk
//! the checkpoint already covers, so an interrupted run resumes at the
//! first unrecorded chunk.
//!
//! Delivery is at-least-once: a crash between a sink write and the
//! checkpoint save makes the next run write that chunk again, under the
//! same chunk index. Sinks keyed by that index store it once.

pub mod reader;
pub mod sink;
pub mod transform;

#[cfg(test)]
pub mod tests;

use self::reader::{ChunkReader, RawChunk};
use self::sink::ChunkSink;
use self::transform::ChunkTransform;

use crate::checkpoint::CheckpointStore;
use crate::error::{Result, SimError};
use crate::header::standardize_header;
use crate::models::{Checkpoint, IngestStats};

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Resumable ingestion of one raw file into one sink
pub struct IngestionPipeline {
    transform: Box<dyn ChunkTransform>,
    store: Box<dyn CheckpointStore>,
    state: Checkpoint,
    manual_header: Option<Vec<String>>,
    show_progress: bool,
}

impl IngestionPipeline {
    /// Create a pipeline, restoring progress from `store` when a
    /// checkpoint exists
    pub fn new(
        transform: impl ChunkTransform + 'static,
        store: impl CheckpointStore + 'static,
    ) -> Result<Self> {
        let state = store.load()?.unwrap_or_default();
        if state.chunks_completed > 0 {
            info!(
                "Resuming ingestion after chunk {}",
                state.chunks_completed
            );
        }
        Ok(Self {
            transform: Box::new(transform),
            store: Box::new(store),
            state,
            manual_header: None,
            show_progress: false,
        })
    }

    /// Read the source as headerless, using `header` for its columns
    pub fn with_manual_header(mut self, header: Vec<String>) -> Self {
        self.manual_header = Some(header);
        self
    }

    /// Enable the progress spinner
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Progress as last restored or recorded
    pub fn state(&self) -> &Checkpoint {
        &self.state
    }

    /// Run the pipeline over `source_path`.
    ///
    /// Returns once the whole source has been read. Any schema, transform
    /// or sink failure aborts immediately; the checkpoint then still names
    /// the last chunk that was fully written.
    pub fn execute<S: ChunkSink + ?Sized>(
        &mut self,
        source_path: &Path,
        chunk_size: usize,
        sink: &mut S,
        ignored_columns: Option<&[String]>,
    ) -> Result<IngestStats> {
        if chunk_size < 1 {
            return Err(SimError::invalid_argument("chunk_size", "must be at least 1"));
        }
        let start_time = Instant::now();

        if let Some(checkpoint) = self.store.load()? {
            self.state = checkpoint;
        }

        let mut reader = ChunkReader::open(source_path, chunk_size, self.manual_header.clone())?;
        info!(
            "Ingesting {} into {} ({} rows per chunk, {} chunks already complete)",
            source_path.display(),
            sink.describe(),
            chunk_size,
            self.state.chunks_completed
        );

        let progress = self.progress_bar();
        let mut stats = IngestStats::default();

        loop {
            let raw = match reader.next_chunk() {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    progress.abandon();
                    error!(chunk = reader.next_index(), "Ingestion aborted: {}", e);
                    return Err(e);
                }
            };
            let chunk_index = raw.index;
            stats.rows_read += raw.len() as u64;

            if self.state.is_completed(chunk_index) {
                debug!("Skipping completed chunk {}", chunk_index);
                stats.chunks_skipped += 1;
                progress.inc(1);
                continue;
            }

            let header = match &self.state.header {
                Some(frozen) => frozen.clone(),
                None => standardize_header(reader.raw_header()),
            };

            match self.process_chunk(raw, &header, sink, ignored_columns) {
                Ok(written) => {
                    stats.chunks_processed += 1;
                    stats.rows_written += written;
                    progress.set_message(format!("chunk {}", chunk_index));
                    progress.inc(1);
                }
                Err(e) => {
                    progress.abandon();
                    error!(chunk = chunk_index, "Ingestion aborted: {}", e);
                    return Err(e);
                }
            }
        }

        progress.finish_and_clear();
        if stats.chunks_processed == 0 && stats.chunks_skipped == 0 {
            warn!("{} contained no data rows", source_path.display());
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Ingestion complete: {} chunks processed, {} skipped, {} rows written",
            stats.chunks_processed, stats.chunks_skipped, stats.rows_written
        );
        Ok(stats)
    }

    /// Transform, write and record one chunk
    fn process_chunk<S: ChunkSink + ?Sized>(
        &mut self,
        raw: RawChunk,
        header: &[String],
        sink: &mut S,
        ignored_columns: Option<&[String]>,
    ) -> Result<u64> {
        let chunk_index = raw.index;
        let frame = raw.into_frame(header)?;

        let mut prepared = self
            .transform
            .apply(frame)
            .map_err(|source| SimError::Transform {
                transform: self.transform.name().to_string(),
                chunk: chunk_index,
                source,
            })?;

        if let Some(ignored) = ignored_columns {
            let removed = prepared.drop_columns(ignored);
            debug!("Dropped {} ignored columns from chunk {}", removed, chunk_index);
        }

        let written = sink.write_chunk(chunk_index, &prepared).map_err(|e| match e {
            SimError::SinkWrite { .. } => e,
            other => SimError::sink_write(sink.describe(), other),
        })?;

        // Only a written chunk advances the durable state
        let mut next = self.state.clone();
        next.header = Some(header.to_vec());
        next.record_chunk();
        self.store.save(&next)?;
        self.state = next;

        debug!(
            "Chunk {} complete ({} rows written)",
            chunk_index, written
        );
        Ok(written)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} chunks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Ingesting");
        pb
    }
}
