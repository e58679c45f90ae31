//! Per-cell statistics across repeated trials.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::trial::TrialResult;

/// Result of feeding one trial into the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCountCheck {
    Consistent,
    /// The trial's chunk count differs from the first trial of the cell.
    Mismatch { expected: u64, observed: u64 },
}

/// Averages of one finished cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSummary {
    pub trial_count: u32,
    pub average_depth: f64,
    pub average_duration_secs: f64,
    pub average_missed_optimistic_hashing: f64,
    pub average_histogram: Vec<f64>,
    /// Chunk count of the first trial, `None` if no trial ran.
    pub total_chunks: Option<u64>,
    pub chunk_count_mismatches: u32,
}

/// Running sums for one (size, compaction level) cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellAccumulator {
    trial_count: u32,
    total_depth: u64,
    total_duration: Duration,
    total_missed_optimistic_hashing: u64,
    histogram_sums: Vec<u64>,
    observed_total_chunks: Option<u64>,
    chunk_count_mismatches: u32,
}

/// Add `histogram` into `sums` index by index, zero-filling `sums` first when
/// `histogram` is longer.
pub fn merge_histogram(sums: &mut Vec<u64>, histogram: &[u64]) {
    if sums.len() < histogram.len() {
        sums.resize(histogram.len(), 0);
    }
    for (sum, value) in sums.iter_mut().zip(histogram) {
        *sum += value;
    }
}

impl CellAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub const fn trial_count(&self) -> u32 {
        self.trial_count
    }

    pub const fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn histogram_sums(&self) -> &[u64] {
        &self.histogram_sums
    }

    pub const fn observed_total_chunks(&self) -> Option<u64> {
        self.observed_total_chunks
    }

    /// Fold one trial into the running sums.
    ///
    /// The first trial fixes the cell's chunk count; later trials are only
    /// compared against it and never replace it.
    pub fn add(&mut self, trial: &TrialResult) -> ChunkCountCheck {
        self.trial_count += 1;
        self.total_depth += u64::from(trial.required_depth);
        self.total_duration += trial.duration;
        self.total_missed_optimistic_hashing += trial.missed_optimistic_hashing;
        merge_histogram(&mut self.histogram_sums, &trial.collision_histogram);

        match self.observed_total_chunks {
            None => {
                self.observed_total_chunks = Some(trial.total_chunks);
                ChunkCountCheck::Consistent
            }
            Some(expected) if expected == trial.total_chunks => ChunkCountCheck::Consistent,
            Some(expected) => {
                self.chunk_count_mismatches += 1;
                ChunkCountCheck::Mismatch {
                    expected,
                    observed: trial.total_chunks,
                }
            }
        }
    }

    /// Average over the configured iteration count.
    ///
    /// The divisor is `iterations`, not the number of trials actually added.
    #[allow(clippy::cast_precision_loss)]
    pub fn finalize(&self, iterations: u32) -> Result<CellSummary> {
        if iterations == 0 {
            return Err(Error::validation("cannot finalize a cell over 0 iterations"));
        }
        let divisor = f64::from(iterations);

        Ok(CellSummary {
            trial_count: self.trial_count,
            average_depth: self.total_depth as f64 / divisor,
            average_duration_secs: self.total_duration.as_secs_f64() / divisor,
            average_missed_optimistic_hashing: self.total_missed_optimistic_hashing as f64
                / divisor,
            average_histogram: self
                .histogram_sums
                .iter()
                .map(|sum| *sum as f64 / divisor)
                .collect(),
            total_chunks: self.observed_total_chunks,
            chunk_count_mismatches: self.chunk_count_mismatches,
        })
    }
}
