//! chunkstats - parameter-sweep benchmark harness for content chunking
//!
//! Runs a chunk evaluator over a grid of (payload size × compaction level)
//! cells, repeats every cell a configured number of times with fresh random
//! payloads, and appends one averaged row per cell to a durable CSV report.
//!
//! Data flows leaf to root:
//! - [`trial`]: one timed evaluation
//! - [`accumulator`]: running sums and collision histogram of a cell
//! - [`sweep`]: grid enumeration and trial scheduling
//! - [`report`]: flushed-per-row CSV sink
//!
//! [`chunker`] provides the bundled evaluator; anything implementing
//! [`evaluator::ChunkEvaluator`] can be swept instead.

#![forbid(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod accumulator;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod payload;
pub mod report;
pub mod sweep;
pub mod trial;

pub use error::{Error, Result as StatsResult};
