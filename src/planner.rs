//! Batch window planning.
//!
//! Splits `[1, total_count]` into contiguous id windows of at most
//! `batch_size` ids. The final window is shorter when the total is not
//! an exact multiple of the batch size.

use crate::error::{Result, SimError};
use crate::models::BatchWindow;

/// Plan the windows covering `[1, total_count]`
pub fn plan(total_count: u64, batch_size: u64) -> Result<Vec<BatchWindow>> {
    if batch_size < 1 {
        return Err(SimError::invalid_argument(
            "batch_size",
            "must be at least 1",
        ));
    }

    let num_windows = total_count.div_ceil(batch_size);
    Ok((1..=num_windows)
        .map(|index| BatchWindow {
            start_id: 1 + (index - 1) * batch_size,
            end_id: index.saturating_mul(batch_size).min(total_count),
            index,
        })
        .collect())
}
