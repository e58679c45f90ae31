//! Chunk evaluator seam.
//!
//! An evaluator takes one payload, splits and addresses it, stamps every
//! chunk into postage buckets and reports the structural metrics the sweep
//! aggregates. The harness never looks inside an evaluator; it only consumes
//! [`EvaluationResult`].

use async_trait::async_trait;

use crate::error::Result;

/// Content type passed to every evaluation.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// File name passed to every evaluation.
pub const DEFAULT_FILE_NAME: &str = "testFile.txt";

/// Outcome of evaluating a single payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvaluationResult {
    /// Data chunks plus intermediate chunks of the chunk tree.
    pub total_chunks: u64,
    /// Smallest postage batch depth able to stamp every chunk.
    pub required_postage_batch_depth: u32,
    /// Chunks whose optimistic first hash had to be redone.
    pub missed_optimistic_hashing: u64,
    buckets_by_collision: Vec<u64>,
}

impl EvaluationResult {
    pub fn new(
        total_chunks: u64,
        required_postage_batch_depth: u32,
        missed_optimistic_hashing: u64,
        buckets_by_collision: Vec<u64>,
    ) -> Self {
        Self {
            total_chunks,
            required_postage_batch_depth,
            missed_optimistic_hashing,
            buckets_by_collision,
        }
    }

    /// Number of buckets holding exactly `index` chunks.
    pub fn buckets_by_collision_count(&self) -> &[u64] {
        &self.buckets_by_collision
    }
}

/// Something able to chunk and stamp a payload.
#[async_trait]
pub trait ChunkEvaluator: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Evaluate one payload at the given compaction level.
    async fn evaluate(
        &self,
        payload: &[u8],
        content_type: &str,
        file_name: &str,
        compaction_level: u16,
    ) -> Result<EvaluationResult>;
}
