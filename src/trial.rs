//! Single timed evaluation.

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::evaluator::{ChunkEvaluator, DEFAULT_CONTENT_TYPE, DEFAULT_FILE_NAME};

/// Metrics of one trial.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrialResult {
    pub total_chunks: u64,
    pub required_depth: u32,
    pub duration: Duration,
    pub missed_optimistic_hashing: u64,
    /// Index is the collision count, value the number of buckets with it.
    pub collision_histogram: Vec<u64>,
}

/// Runs one evaluation and times it with the harness clock.
pub struct TrialRunner<'a> {
    evaluator: &'a dyn ChunkEvaluator,
}

impl<'a> TrialRunner<'a> {
    pub fn new(evaluator: &'a dyn ChunkEvaluator) -> Self {
        Self { evaluator }
    }

    /// Evaluate `payload` once. Evaluator errors are returned unchanged.
    pub async fn run(&self, payload: &[u8], compaction_level: u16) -> Result<TrialResult> {
        let start = Instant::now();
        let result = self
            .evaluator
            .evaluate(
                payload,
                DEFAULT_CONTENT_TYPE,
                DEFAULT_FILE_NAME,
                compaction_level,
            )
            .await?;
        let duration = start.elapsed();

        Ok(TrialResult {
            total_chunks: result.total_chunks,
            required_depth: result.required_postage_batch_depth,
            duration,
            missed_optimistic_hashing: result.missed_optimistic_hashing,
            collision_histogram: result.buckets_by_collision_count().to_vec(),
        })
    }
}
