//! Basic ingestion tests

use super::{RecordingSink, checkpoint_path, write_raw_file};
use crate::checkpoint::{CheckpointStore, JsonCheckpointStore, MemoryCheckpointStore};
use crate::error::{BoxError, SimError};
use crate::models::{Frame, Value};
use crate::processor::IngestionPipeline;
use crate::processor::sink::CsvFileSink;
use crate::processor::transform::Identity;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_chunks_written_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 7);

    let store = JsonCheckpointStore::new(checkpoint_path(&temp_dir));
    let mut pipeline = IngestionPipeline::new(Identity, store.clone()).unwrap();
    let mut sink = RecordingSink::default();

    let stats = pipeline.execute(&raw, 3, &mut sink, None).unwrap();

    assert_eq!(stats.chunks_processed, 3);
    assert_eq!(stats.chunks_skipped, 0);
    assert_eq!(stats.rows_read, 7);
    assert_eq!(stats.rows_written, 7);
    let sizes: Vec<usize> = sink.chunks.iter().map(Frame::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);

    let first_ids: Vec<Value> = sink
        .chunks
        .iter()
        .map(|chunk| chunk.row(0).unwrap().get("id_number").unwrap().clone())
        .collect();
    assert_eq!(
        first_ids,
        vec![Value::Integer(1), Value::Integer(4), Value::Integer(7)]
    );

    let checkpoint = store.load().unwrap().unwrap();
    assert_eq!(checkpoint.chunks_completed, 3);
}

#[test]
fn test_header_standardized_and_frozen() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 2);

    let store = JsonCheckpointStore::new(checkpoint_path(&temp_dir));
    let mut pipeline = IngestionPipeline::new(Identity, store.clone()).unwrap();
    let mut sink = RecordingSink::default();
    pipeline.execute(&raw, 1, &mut sink, None).unwrap();

    let expected = vec![
        "id_number".to_string(),
        "first_name".to_string(),
        "score".to_string(),
    ];
    assert_eq!(sink.chunks[0].columns(), &expected[..]);
    assert_eq!(sink.chunks[1].columns(), &expected[..]);
    assert_eq!(store.load().unwrap().unwrap().header, Some(expected));
}

#[test]
fn test_ignored_columns_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 4);

    let mut pipeline = IngestionPipeline::new(Identity, MemoryCheckpointStore::default()).unwrap();
    let mut sink = RecordingSink::default();
    let ignored = vec!["first_name".to_string(), "not_present".to_string()];
    pipeline.execute(&raw, 10, &mut sink, Some(&ignored)).unwrap();

    assert_eq!(
        sink.chunks[0].columns(),
        &["id_number".to_string(), "score".to_string()][..]
    );
}

#[test]
fn test_transform_applied_to_every_chunk() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 5);

    let double_score = |mut frame: Frame| -> Result<Frame, BoxError> {
        frame.map_column("score", |v| Value::Integer(v.as_i64().unwrap_or(0) * 2))?;
        Ok(frame)
    };
    let mut pipeline =
        IngestionPipeline::new(double_score, MemoryCheckpointStore::default()).unwrap();
    let mut sink = RecordingSink::default();
    pipeline.execute(&raw, 2, &mut sink, None).unwrap();

    let scores: Vec<i64> = sink
        .chunks
        .iter()
        .flat_map(|chunk| chunk.rows().map(|row| row.get("score").unwrap().as_i64().unwrap()).collect::<Vec<_>>())
        .collect();
    assert_eq!(scores, vec![20, 40, 60, 80, 100]);
}

#[test]
fn test_csv_sink_header_written_once() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 3);
    let output = temp_dir.path().join("prepared.csv");

    let mut pipeline = IngestionPipeline::new(Identity, MemoryCheckpointStore::default()).unwrap();
    let mut sink = CsvFileSink::new(&output);
    pipeline.execute(&raw, 2, &mut sink, None).unwrap();

    let content = fs::read_to_string(&output).unwrap();
    assert_eq!(
        content,
        "id_number,first_name,score\n1,name1,10\n2,name2,20\n3,name3,30\n"
    );
}

#[test]
fn test_manual_header() {
    let temp_dir = TempDir::new().unwrap();
    let raw = temp_dir.path().join("headerless.csv");
    fs::write(&raw, "1,ann\n2,bob\n").unwrap();

    let mut pipeline = IngestionPipeline::new(Identity, MemoryCheckpointStore::default())
        .unwrap()
        .with_manual_header(vec!["Voter ID".to_string(), "Name".to_string()]);
    let mut sink = RecordingSink::default();
    let stats = pipeline.execute(&raw, 10, &mut sink, None).unwrap();

    assert_eq!(stats.rows_written, 2);
    assert_eq!(
        sink.chunks[0].columns(),
        &["voter_id".to_string(), "name".to_string()][..]
    );
}

#[test]
fn test_zero_chunk_size_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw_file(&temp_dir, 1);

    let mut pipeline = IngestionPipeline::new(Identity, MemoryCheckpointStore::default()).unwrap();
    let mut sink = RecordingSink::default();
    assert!(matches!(
        pipeline.execute(&raw, 0, &mut sink, None),
        Err(SimError::InvalidArgument { .. })
    ));
}
