//! Training extract export.
//!
//! Each window is converted to a polars `DataFrame`, the donor fraction is
//! derived lazily, identifier and raw-total columns are excluded and the
//! result is appended to the output CSV. The output is truncated before
//! the first window is read, so an export with no windows leaves an empty
//! file; the first window writes the header.

use super::{RecordGenerator, RowSource, WindowedReader};
use crate::config::ZeroPopulationPolicy;
use crate::constants::columns;
use crate::error::{Result, SimError};
use crate::models::{Frame, GenerationStats, Value};

use polars::prelude::{
    Column, CsvWriter, DataFrame, DataType, IntoLazy, SerWriter, col, lit, when,
};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Convert a frame to a polars `DataFrame`.
///
/// Columns holding only integers become `Int64`, numeric columns with any
/// real become `Float64`, anything else is written as text.
pub fn frame_to_dataframe(frame: &Frame) -> Result<DataFrame> {
    let mut data = Vec::with_capacity(frame.width());
    for name in frame.columns() {
        let values = frame.column(name)?;
        data.push(to_column(name, &values));
    }
    Ok(DataFrame::new(data)?)
}

fn to_column(name: &str, values: &[&Value]) -> Column {
    let integral = values
        .iter()
        .all(|v| matches!(v, Value::Integer(_) | Value::Null));
    let numeric = values
        .iter()
        .all(|v| matches!(v, Value::Integer(_) | Value::Real(_) | Value::Null));

    if integral {
        let data: Vec<Option<i64>> = values.iter().map(|v| v.as_i64()).collect();
        Column::new(name.into(), data)
    } else if numeric {
        let data: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
        Column::new(name.into(), data)
    } else {
        let data: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        Column::new(name.into(), data)
    }
}

impl RecordGenerator {
    /// Export windows of `source` as training rows to `output_path`.
    ///
    /// Output columns are the source columns minus the configured drop
    /// list, plus the derived ratio column.
    pub fn export_training<S: RowSource + ?Sized>(
        &self,
        source: &S,
        output_path: &Path,
        total_count: Option<u64>,
        batch_size: u64,
    ) -> Result<GenerationStats> {
        let start_time = Instant::now();
        let reader = WindowedReader::new(source, total_count, batch_size)?;
        info!(
            "Exporting training data from {} to {} ({} windows)",
            source.describe(),
            output_path.display(),
            reader.remaining()
        );

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        File::create(output_path)?;

        let progress = self.progress_bar(reader.remaining(), "Exporting training data");
        let mut stats = GenerationStats {
            output_path: Some(output_path.to_path_buf()),
            ..Default::default()
        };

        for item in reader {
            let first = stats.windows_processed == 0;
            let result = item.and_then(|(window, frame)| {
                let mut training = self.training_frame(&frame)?;
                write_window(output_path, &mut training, first)?;
                debug!(
                    "Window {} exported {} rows (ids {}-{})",
                    window.index,
                    training.height(),
                    window.start_id,
                    window.end_id
                );
                Ok((frame.len() as u64, training.height() as u64))
            });

            match result {
                Ok((rows, written)) => {
                    stats.windows_processed += 1;
                    stats.rows_read += rows;
                    stats.records_written += written;
                    progress.inc(1);
                }
                Err(e) => {
                    progress.abandon();
                    error!(
                        window = stats.windows_processed + 1,
                        "Training export aborted: {}", e
                    );
                    return Err(e);
                }
            }
        }

        progress.finish_and_clear();
        stats.processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Exported {} training rows in {} windows",
            stats.records_written, stats.windows_processed
        );
        Ok(stats)
    }

    /// Derive the ratio column and drop excluded columns for one window
    pub fn training_frame(&self, frame: &Frame) -> Result<DataFrame> {
        let config = self.training_config();
        frame.require(&config.donors_column)?;
        frame.require(&config.population_column)?;

        if config.zero_population == ZeroPopulationPolicy::Fail {
            reject_zero_population(frame, &config.population_column, &config.ratio_column)?;
        }

        let donors = col(config.donors_column.as_str()).cast(DataType::Float64);
        let population = col(config.population_column.as_str()).cast(DataType::Float64);
        let ratio = when(population.clone().eq(lit(0.0)))
            .then(lit(f64::NAN))
            .otherwise(donors / population)
            .alias(config.ratio_column.as_str());

        let mut kept: Vec<_> = frame
            .columns()
            .iter()
            .filter(|name| !config.drop_columns.contains(name) && **name != config.ratio_column)
            .map(|name| col(name.as_str()))
            .collect();
        kept.push(col(config.ratio_column.as_str()));

        let training = frame_to_dataframe(frame)?
            .lazy()
            .with_columns([ratio])
            .select(kept)
            .collect()?;
        Ok(training)
    }
}

fn reject_zero_population(frame: &Frame, population_column: &str, ratio_column: &str) -> Result<()> {
    for (offset, row) in frame.rows().enumerate() {
        let is_zero = row
            .get(population_column)
            .and_then(Value::as_f64)
            .is_some_and(|population| population == 0.0);
        if is_zero {
            let row_id = row
                .get(columns::ID)
                .and_then(Value::as_i64)
                .unwrap_or(offset as i64 + 1);
            return Err(SimError::DivisionByZero {
                column: ratio_column.to_string(),
                row_id,
            });
        }
    }
    Ok(())
}

fn write_window(path: &Path, training: &mut DataFrame, first: bool) -> Result<()> {
    let file = if first {
        File::create(path)?
    } else {
        OpenOptions::new().append(true).open(path)?
    };
    CsvWriter::new(file)
        .include_header(first)
        .finish(training)?;
    Ok(())
}
