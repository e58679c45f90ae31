//! Common test infrastructure for chunkstats integration tests.
//!
//! - Scripted evaluators whose results are chosen per call
//! - Small sweep configurations writing into a temp directory
//! - One-time tracing setup routed through the test writer

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chunkstats::config::{PayloadSize, SweepConfig};
use chunkstats::error::{Error, Result};
use chunkstats::evaluator::{ChunkEvaluator, EvaluationResult};

/// Route harness logs through libtest's captured output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("chunkstats=debug")
        .with_test_writer()
        .try_init();
}

/// One recorded evaluator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub payload_len: usize,
    pub compaction_level: u16,
}

type Script = dyn Fn(usize, &Call) -> Result<EvaluationResult> + Send + Sync;

/// Evaluator answering each call from a closure of (call index, call).
pub struct ScriptedEvaluator {
    script: Box<Script>,
    calls: Mutex<Vec<Call>>,
    counter: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new(
        script: impl Fn(usize, &Call) -> Result<EvaluationResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// Depth depends only on the compaction level, chunk count on the size.
    pub fn deterministic() -> Self {
        Self::new(|_, call| {
            Ok(result(
                call.payload_len as u64,
                17 + u32::from(call.compaction_level % 4),
                vec![65_534, 2],
            ))
        })
    }

    /// Fails with an evaluation error on call `fail_at` (zero based).
    pub fn failing_at(fail_at: usize) -> Self {
        Self::new(move |index, call| {
            if index == fail_at {
                Err(Error::evaluation("scripted", "injected failure"))
            } else {
                Ok(result(call.payload_len as u64, 17, vec![1]))
            }
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChunkEvaluator for ScriptedEvaluator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn evaluate(
        &self,
        payload: &[u8],
        _content_type: &str,
        _file_name: &str,
        compaction_level: u16,
    ) -> Result<EvaluationResult> {
        let call = Call {
            payload_len: payload.len(),
            compaction_level,
        };
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call.clone());
        (self.script)(index, &call)
    }
}

pub fn result(total_chunks: u64, depth: u32, histogram: Vec<u64>) -> EvaluationResult {
    EvaluationResult::new(total_chunks, depth, 0, histogram)
}

/// Small grid writing its report to `dir/report.csv`.
pub fn small_config(
    dir: &Path,
    sizes: &[(usize, &str)],
    levels: &[u16],
    iterations: u32,
) -> SweepConfig {
    SweepConfig {
        sizes: sizes
            .iter()
            .map(|(bytes, label)| PayloadSize::new(*bytes, *label))
            .collect(),
        compaction_levels: levels.to_vec(),
        iterations,
        report_path: dir.join("report.csv"),
        ..SweepConfig::default()
    }
}
