//! Durable ingestion checkpoints.
//!
//! The pipeline keeps its progress as a plain `Checkpoint` value and hands
//! it to a `CheckpointStore` after every successful chunk. The file store
//! replaces the checkpoint atomically: a reader sees either the previous
//! or the new checkpoint, never a partial write.

use crate::error::{Result, SimError};
use crate::models::Checkpoint;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::debug;

/// Load and save ingestion progress
pub trait CheckpointStore {
    /// The stored checkpoint, or `None` for a fresh run
    fn load(&self) -> Result<Option<Checkpoint>>;

    /// Replace the stored checkpoint
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Checkpoint stored as a JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the checkpoint so the next run starts from chunk 1
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed checkpoint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        debug!(
            "Loaded checkpoint {} ({} chunks completed)",
            self.path.display(),
            checkpoint.chunks_completed
        );
        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        // Temp file must share the target's filesystem for the rename
        let mut temp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut temp, checkpoint)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!(
            "Saved checkpoint {} at chunk {}",
            self.path.display(),
            checkpoint.chunks_completed
        );
        Ok(())
    }
}

/// Checkpoint held in memory; used where durability is not wanted.
///
/// A lock poisoned by a panicking writer is reported as an error rather
/// than trusted.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    state: Mutex<Option<Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new(initial: Option<Checkpoint>) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Checkpoint>>> {
        self.state.lock().map_err(|_| SimError::CheckpointUnavailable {
            reason: "in-memory checkpoint lock poisoned".to_string(),
        })
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        *self.lock()? = Some(checkpoint.clone());
        Ok(())
    }
}
