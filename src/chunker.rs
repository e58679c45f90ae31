//! Built-in chunk evaluator.
//!
//! Payloads are cut into 4 KiB data chunks, each addressed by
//! `SHA-256(span_le || data)`. Parent chunks pack up to 128 child addresses
//! and are addressed the same way, with the span counting every payload byte
//! below them, until a single root remains. Every chunk, data or parent, is
//! stamped into one of 2^16 postage buckets selected by the first two address
//! bytes.
//!
//! A compaction level above zero lets a data chunk be re-addressed with up to
//! `level` extra keys so it lands in one of the least filled buckets. The
//! first (unkeyed) hash is the optimistic attempt; every chunk that needs a
//! keyed retry counts as a missed optimistic hash.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::evaluator::{ChunkEvaluator, EvaluationResult};

/// Maximum payload bytes in a data chunk.
pub const CHUNK_SIZE: usize = 4096;

/// Child references held by a parent chunk.
pub const BRANCHES: usize = 128;

/// Address bits used to select a postage bucket.
pub const BUCKET_DEPTH: u32 = 16;

/// Number of postage buckets.
pub const BUCKET_COUNT: usize = 1 << BUCKET_DEPTH;

/// Smallest batch depth a postage batch may have.
pub const MIN_BATCH_DEPTH: u32 = BUCKET_DEPTH + 1;

pub type ChunkAddress = [u8; 32];

/// Bucket index of a chunk address.
pub fn bucket_of(address: &ChunkAddress) -> usize {
    usize::from(u16::from_be_bytes([address[0], address[1]]))
}

fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        u32::BITS - (value - 1).leading_zeros()
    }
}

/// Fill level of every postage bucket.
///
/// `fill_histogram[n]` is the number of buckets holding exactly `n` chunks.
/// Its last entry is always non-zero, so its length is the maximum fill plus
/// one.
#[derive(Debug, Clone)]
pub struct PostageBuckets {
    fills: Vec<u32>,
    fill_histogram: Vec<u64>,
    min_fill: u32,
    total_chunks: u64,
}

impl Default for PostageBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl PostageBuckets {
    pub fn new() -> Self {
        Self {
            fills: vec![0; BUCKET_COUNT],
            fill_histogram: vec![BUCKET_COUNT as u64],
            min_fill: 0,
            total_chunks: 0,
        }
    }

    pub fn fill(&self, bucket: usize) -> u32 {
        self.fills[bucket]
    }

    pub const fn min_fill(&self) -> u32 {
        self.min_fill
    }

    pub fn max_fill(&self) -> u32 {
        u32::try_from(self.fill_histogram.len() - 1).unwrap_or(u32::MAX)
    }

    pub const fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Stamp a chunk and return the new fill of its bucket.
    pub fn stamp(&mut self, address: &ChunkAddress) -> u32 {
        let bucket = bucket_of(address);
        let old = self.fills[bucket] as usize;
        let new = old + 1;
        if self.fill_histogram.len() == new {
            self.fill_histogram.push(0);
        }
        self.fill_histogram[old] -= 1;
        self.fill_histogram[new] += 1;
        self.fills[bucket] += 1;
        self.total_chunks += 1;

        while self.fill_histogram[self.min_fill as usize] == 0 {
            self.min_fill += 1;
        }
        self.fills[bucket]
    }

    /// Depth a postage batch needs so no bucket overflows.
    pub fn required_depth(&self) -> u32 {
        MIN_BATCH_DEPTH.max(BUCKET_DEPTH + ceil_log2(self.max_fill()))
    }

    pub fn buckets_by_collision_count(&self) -> &[u64] {
        &self.fill_histogram
    }
}

fn span_hasher(span: u64) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(span.to_le_bytes());
    hasher
}

/// Pick an address for a data chunk. Returns the address and whether the
/// optimistic attempt was rejected.
fn mine_address(
    buckets: &PostageBuckets,
    data: &[u8],
    compaction_level: u16,
) -> (ChunkAddress, bool) {
    let mut base = span_hasher(data.len() as u64);
    base.update(data);
    let optimistic: ChunkAddress = base.clone().finalize().into();

    let target = buckets.min_fill();
    let optimistic_fill = buckets.fill(bucket_of(&optimistic));
    if compaction_level == 0 || optimistic_fill <= target {
        return (optimistic, false);
    }

    let mut best = optimistic;
    let mut best_fill = optimistic_fill;
    for key in 1..=compaction_level {
        let mut hasher = base.clone();
        hasher.update(key.to_be_bytes());
        let candidate: ChunkAddress = hasher.finalize().into();
        let fill = buckets.fill(bucket_of(&candidate));
        if fill <= target {
            return (candidate, true);
        }
        if fill < best_fill {
            best = candidate;
            best_fill = fill;
        }
    }
    (best, true)
}

/// Chunk tree builder with postage bucket accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwarmChunkEvaluator;

impl SwarmChunkEvaluator {
    pub const fn new() -> Self {
        Self
    }

    /// Synchronous core of [`ChunkEvaluator::evaluate`].
    pub fn evaluate_blocking(&self, payload: &[u8], compaction_level: u16) -> EvaluationResult {
        let mut buckets = PostageBuckets::new();
        let mut missed_optimistic_hashing = 0u64;

        let mut level: Vec<(ChunkAddress, u64)> = if payload.is_empty() {
            let address: ChunkAddress = span_hasher(0).finalize().into();
            buckets.stamp(&address);
            vec![(address, 0)]
        } else {
            let mut data_chunks = Vec::with_capacity(payload.len().div_ceil(CHUNK_SIZE));
            for data in payload.chunks(CHUNK_SIZE) {
                let (address, missed) = mine_address(&buckets, data, compaction_level);
                if missed {
                    missed_optimistic_hashing += 1;
                }
                buckets.stamp(&address);
                data_chunks.push((address, data.len() as u64));
            }
            data_chunks
        };

        while level.len() > 1 {
            let mut parents = Vec::with_capacity(level.len().div_ceil(BRANCHES));
            for children in level.chunks(BRANCHES) {
                let span: u64 = children.iter().map(|(_, span)| span).sum();
                let mut hasher = span_hasher(span);
                for (address, _) in children {
                    hasher.update(address);
                }
                let address: ChunkAddress = hasher.finalize().into();
                buckets.stamp(&address);
                parents.push((address, span));
            }
            level = parents;
        }

        EvaluationResult::new(
            buckets.total_chunks(),
            buckets.required_depth(),
            missed_optimistic_hashing,
            buckets.buckets_by_collision_count().to_vec(),
        )
    }
}

#[async_trait]
impl ChunkEvaluator for SwarmChunkEvaluator {
    fn name(&self) -> &'static str {
        "swarm-chunker"
    }

    async fn evaluate(
        &self,
        payload: &[u8],
        content_type: &str,
        file_name: &str,
        compaction_level: u16,
    ) -> Result<EvaluationResult> {
        tracing::trace!(
            bytes = payload.len(),
            content_type,
            file_name,
            compaction_level,
            "Evaluating payload"
        );
        Ok(self.evaluate_blocking(payload, compaction_level))
    }
}
