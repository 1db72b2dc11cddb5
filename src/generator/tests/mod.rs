//! Generator scenario tests
//!
//! Run the generator against in-memory sources and sinks.


use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::generator::{EventSink, RecordGenerator, RowSource};
use crate::models::{BatchWindow, CallEvent, Frame, Value};
use std::cell::Cell;

/// Source backed by a frame with an `id` column
pub struct FrameSource {
    pub frame: Frame,
    pub reads: Cell<u64>,
    pub fail_on_window: Option<u64>,
}

impl FrameSource {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            reads: Cell::new(0),
            fail_on_window: None,
        }
    }
}

impl RowSource for FrameSource {
    fn row_count(&self) -> Result<u64> {
        Ok(self.frame.len() as u64)
    }

    fn read_window(&self, window: &BatchWindow) -> Result<Frame> {
        self.reads.set(self.reads.get() + 1);
        if self.fail_on_window == Some(window.index) {
            return Err(SimError::schema("frame source", "window unreadable"));
        }
        let rows = self
            .frame
            .rows()
            .filter(|row| {
                row.get("id")
                    .and_then(Value::as_i64)
                    .is_some_and(|id| id >= window.start_id as i64 && id <= window.end_id as i64)
            })
            .map(|row| row.values().to_vec())
            .collect();
        Frame::with_rows(self.frame.columns().to_vec(), rows)
    }

    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

/// Sink keeping events grouped by window
#[derive(Default)]
pub struct VecEventSink {
    pub windows: Vec<(BatchWindow, Vec<CallEvent>)>,
}

impl VecEventSink {
    pub fn events(&self) -> Vec<&CallEvent> {
        self.windows.iter().flat_map(|(_, events)| events).collect()
    }
}

impl EventSink for VecEventSink {
    fn write_events(&mut self, window: &BatchWindow, events: &[CallEvent]) -> Result<u64> {
        self.windows.push((*window, events.to_vec()));
        Ok(events.len() as u64)
    }
}

pub fn voter_frame(n: i64) -> Frame {
    Frame::with_rows(
        vec!["id".to_string(), "ohvfid".to_string(), "age".to_string()],
        (1..=n)
            .map(|i| {
                vec![
                    Value::Integer(i),
                    Value::from(format!("OH{:04}", i)),
                    Value::Integer(20 + i),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn seeded_generator(seed: u64) -> RecordGenerator {
    RecordGenerator::new(&SimConfig::default().with_seed(Some(seed)))
}
