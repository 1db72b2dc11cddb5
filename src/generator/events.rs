//! Call event synthesis.

use super::{EventSink, RecordGenerator, RowSource, WindowedReader};
use crate::constants::columns;
use crate::error::{Result, SimError};
use crate::models::{CallEvent, Frame, GenerationStats, Value};

use rand::Rng;
use rand::seq::index;
use std::time::Instant;
use tracing::{error, info};

/// Number of positive responses for a window of `rows` rows
pub fn positives_for(pos_rate: f64, rows: usize) -> usize {
    ((pos_rate * rows as f64).round_ties_even() as usize).min(rows)
}

/// One event per row; exactly `positives_for(pos_rate, rows)` rows,
/// chosen uniformly without replacement, are positive
pub fn sample_events<R: Rng + ?Sized>(
    rng: &mut R,
    frame: &Frame,
    pos_rate: f64,
) -> Result<Vec<CallEvent>> {
    let key_pos = frame.require(columns::VOTER_KEY)?;
    let rows: Vec<&[Value]> = frame.rows().map(|row| row.values()).collect();

    let mut results = vec![0i64; rows.len()];
    let positives = positives_for(pos_rate, rows.len());
    for selected in index::sample(rng, rows.len(), positives) {
        results[selected] = 1;
    }

    Ok(rows
        .into_iter()
        .zip(results)
        .map(|(values, call_result)| CallEvent {
            voter_key: values[key_pos].clone(),
            call_result,
        })
        .collect())
}

impl RecordGenerator {
    /// Synthesize one call event per source row in `[1, total_count]`.
    ///
    /// Sampling is independent per window, so the overall positive
    /// fraction is the size-weighted mean of per-window rates.
    pub fn generate_events<S, K>(
        &mut self,
        source: &S,
        sink: &mut K,
        pos_rate: f64,
        total_count: Option<u64>,
        batch_size: u64,
    ) -> Result<GenerationStats>
    where
        S: RowSource + ?Sized,
        K: EventSink + ?Sized,
    {
        if !(0.0..=1.0).contains(&pos_rate) {
            return Err(SimError::invalid_argument(
                "pos_rate",
                format!("{} is outside [0, 1]", pos_rate),
            ));
        }
        let start_time = Instant::now();
        let reader = WindowedReader::new(source, total_count, batch_size)?;
        info!(
            "Generating call events from {} ({} windows, positive rate {})",
            source.describe(),
            reader.remaining(),
            pos_rate
        );

        let progress = self.progress_bar(reader.remaining(), "Generating calls");
        let mut stats = GenerationStats::default();

        for item in reader {
            let result = item.and_then(|(window, frame)| {
                let events = sample_events(&mut self.rng, &frame, pos_rate)?;
                let written = sink.write_events(&window, &events)?;
                Ok((window, frame.len() as u64, written, events))
            });

            match result {
                Ok((window, rows, written, events)) => {
                    stats.windows_processed += 1;
                    stats.rows_read += rows;
                    stats.records_written += written;
                    stats.positives += events.iter().filter(|e| e.call_result == 1).count() as u64;
                    progress.set_message(format!("window {}", window.index));
                    progress.inc(1);
                }
                Err(e) => {
                    progress.abandon();
                    error!(
                        window = stats.windows_processed + 1,
                        "Call generation aborted: {}", e
                    );
                    return Err(e);
                }
            }
        }

        progress.finish_and_clear();
        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Generated {} call events ({} positive, fraction {:.4}) in {} windows",
            stats.records_written,
            stats.positives,
            stats.positive_fraction(),
            stats.windows_processed
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn voters(n: i64) -> Frame {
        Frame::with_rows(
            vec!["id".to_string(), "ohvfid".to_string()],
            (1..=n)
                .map(|i| vec![Value::Integer(i), Value::from(format!("OH{:04}", i))])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_positives_round_half_even() {
        assert_eq!(positives_for(1.0 / 3.0, 3), 1);
        assert_eq!(positives_for(0.5, 5), 2);
        assert_eq!(positives_for(0.5, 7), 4);
        assert_eq!(positives_for(0.0, 10), 0);
        assert_eq!(positives_for(1.0, 10), 10);
    }

    #[test]
    fn test_sample_exact_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let frame = voters(20);
        let events = sample_events(&mut rng, &frame, 0.25).unwrap();

        assert_eq!(events.len(), 20);
        assert_eq!(events.iter().map(|e| e.call_result).sum::<i64>(), 5);
        assert_eq!(events[3].voter_key, Value::from("OH0004"));
    }

    #[test]
    fn test_sample_requires_voter_key() {
        let mut rng = StdRng::seed_from_u64(7);
        let frame = Frame::with_rows(vec!["id".to_string()], vec![vec![Value::Integer(1)]]).unwrap();
        assert!(matches!(
            sample_events(&mut rng, &frame, 0.5),
            Err(SimError::Schema { .. })
        ));
    }
}
