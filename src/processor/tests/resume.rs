//! Resume and idempotence tests

use super::{RecordingSink, checkpoint_path, write_raw_file};
use crate::checkpoint::{CheckpointStore, JsonCheckpointStore};
use crate::database::SimDatabase;
use crate::error::{BoxError, Result as SimResult, SimError};
use crate::models::{Checkpoint, Frame, Value};
use crate::processor::IngestionPipeline;
use crate::processor::transform::Identity;
use std::cell::Cell;
use tempfile::TempDir;

/// File store whose `fail_on`-th save fails, as if the process died
/// after the sink committed
struct FailingSaveStore {
    inner: JsonCheckpointStore,
    saves: Cell<u32>,
    fail_on: u32,
}

impl CheckpointStore for FailingSaveStore {
    fn load(&self) -> SimResult<Option<Checkpoint>> {
        self.inner.load()
    }

    fn save(&self, checkpoint: &Checkpoint) -> SimResult<()> {
        let attempt = self.saves.get() + 1;
        self.saves.set(attempt);
        if attempt == self.fail_on {
            return Err(SimError::Io(std::io::Error::other("killed before save")));
        }
        self.inner.save(checkpoint)
    }
}

fn first_id(chunk: &Frame) -> i64 {
    chunk.row(0).unwrap().get("id_number").unwrap().as_i64().unwrap()
}

#[test]
fn test_second_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 6);
    let store = JsonCheckpointStore::new(checkpoint_path(&temp_dir));

    let mut first = IngestionPipeline::new(Identity, store.clone()).unwrap();
    let mut sink = RecordingSink::default();
    first.execute(&raw, 2, &mut sink, None).unwrap();
    assert_eq!(sink.chunks.len(), 3);

    let mut second = IngestionPipeline::new(Identity, store.clone()).unwrap();
    let mut rerun_sink = RecordingSink::default();
    let stats = second.execute(&raw, 2, &mut rerun_sink, None).unwrap();

    assert!(rerun_sink.chunks.is_empty());
    assert_eq!(stats.chunks_processed, 0);
    assert_eq!(stats.chunks_skipped, 3);
    assert_eq!(store.load().unwrap().unwrap().chunks_completed, 3);
}

#[test]
fn test_crash_and_resume() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 10);
    let store = JsonCheckpointStore::new(checkpoint_path(&temp_dir));

    // Fails on chunk 3 (ids 5-6)
    let crash_at_five = |frame: Frame| -> Result<Frame, BoxError> {
        let hits_five = frame
            .rows()
            .any(|row| row.get("id_number") == Some(&Value::Integer(5)));
        if hits_five {
            return Err("simulated crash".into());
        }
        Ok(frame)
    };

    let mut crashing = IngestionPipeline::new(crash_at_five, store.clone()).unwrap();
    let mut sink = RecordingSink::default();
    assert!(crashing.execute(&raw, 2, &mut sink, None).is_err());
    assert_eq!(sink.chunks.len(), 2);
    assert_eq!(store.load().unwrap().unwrap().chunks_completed, 2);

    let mut resumed = IngestionPipeline::new(Identity, store.clone()).unwrap();
    assert_eq!(resumed.state().chunks_completed, 2);
    let mut resumed_sink = RecordingSink::default();
    let stats = resumed.execute(&raw, 2, &mut resumed_sink, None).unwrap();

    let resumed_ids: Vec<i64> = resumed_sink.chunks.iter().map(first_id).collect();
    assert_eq!(resumed_ids, vec![5, 7, 9]);
    assert_eq!(stats.chunks_skipped, 2);
    assert_eq!(store.load().unwrap().unwrap().chunks_completed, 5);
}

#[test]
fn test_restored_header_used_for_remaining_chunks() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 4);
    let store = JsonCheckpointStore::new(checkpoint_path(&temp_dir));

    let frozen = vec!["voter".to_string(), "name".to_string(), "points".to_string()];
    store
        .save(&Checkpoint {
            header: Some(frozen.clone()),
            chunks_completed: 1,
            updated_at: None,
        })
        .unwrap();

    let mut pipeline = IngestionPipeline::new(Identity, store).unwrap();
    let mut sink = RecordingSink::default();
    pipeline.execute(&raw, 2, &mut sink, None).unwrap();

    assert_eq!(sink.chunks.len(), 1);
    assert_eq!(sink.chunks[0].columns(), &frozen[..]);
    assert_eq!(
        sink.chunks[0].row(0).unwrap().get("voter"),
        Some(&Value::Integer(3))
    );
}

#[test]
fn test_resume_after_lost_checkpoint_does_not_duplicate_rows() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 4);
    let store = JsonCheckpointStore::new(checkpoint_path(&temp_dir));
    let db = SimDatabase::open_in_memory().unwrap();

    // chunk 2 reaches the table but its checkpoint never does
    let failing = FailingSaveStore {
        inner: store.clone(),
        saves: Cell::new(0),
        fail_on: 2,
    };
    let mut crashed = IngestionPipeline::new(Identity, failing).unwrap();
    assert!(crashed.execute(&raw, 2, &mut db.raw_table("raw"), None).is_err());
    assert_eq!(db.count_rows("raw").unwrap(), 4);
    assert_eq!(store.load().unwrap().unwrap().chunks_completed, 1);

    let mut resumed = IngestionPipeline::new(Identity, store.clone()).unwrap();
    let stats = resumed.execute(&raw, 2, &mut db.raw_table("raw"), None).unwrap();

    assert_eq!(stats.chunks_skipped, 1);
    assert_eq!(stats.rows_written, 2);
    assert_eq!(db.count_rows("raw").unwrap(), 4);
    assert_eq!(store.load().unwrap().unwrap().chunks_completed, 2);
}
