//! Sweep controller: drives every cell of the grid through repeated trials.
//!
//! Cells are visited strictly in [`SweepConfig::cells`] order and trials run
//! one after the other. A cell's row reaches the sink before the next cell
//! starts, so an aborted sweep leaves every completed cell in the report.

use std::time::{Duration, Instant};

use crate::accumulator::{CellAccumulator, CellSummary, ChunkCountCheck};
use crate::config::{ConsistencyPolicy, SweepCell, SweepConfig};
use crate::error::{Error, Result};
use crate::evaluator::ChunkEvaluator;
use crate::payload::PayloadSource;
use crate::report::{CsvReportSink, ReportFormat, ReportRow, ReportSink};
use crate::trial::{TrialResult, TrialRunner};

/// Where the controller is in the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    RunningCell,
    TrialInProgress,
    CellFinalizing,
    Done,
}

/// Totals of a finished sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub cells: usize,
    pub rows_written: usize,
    pub chunk_count_mismatches: u64,
    pub elapsed: Duration,
}

pub struct SweepController<'a> {
    config: &'a SweepConfig,
    evaluator: &'a dyn ChunkEvaluator,
    accumulator: CellAccumulator,
    state: SweepState,
}

impl<'a> SweepController<'a> {
    pub fn new(config: &'a SweepConfig, evaluator: &'a dyn ChunkEvaluator) -> Self {
        Self {
            config,
            evaluator,
            accumulator: CellAccumulator::new(),
            state: SweepState::Idle,
        }
    }

    pub const fn state(&self) -> SweepState {
        self.state
    }

    fn transition(&mut self, next: SweepState) {
        tracing::trace!(from = ?self.state, to = ?next, "Sweep state change");
        self.state = next;
    }

    /// Run the whole grid, appending one row per cell to `sink`.
    ///
    /// The first failing trial or sink write aborts the sweep.
    pub async fn run(
        &mut self,
        payloads: &mut dyn PayloadSource,
        sink: &mut dyn ReportSink,
    ) -> Result<SweepOutcome> {
        let config = self.config;
        config.validate()?;
        let started = Instant::now();
        let runner = TrialRunner::new(self.evaluator);

        tracing::info!(
            cells = config.cell_count(),
            iterations = config.iterations,
            evaluator = self.evaluator.name(),
            "Starting sweep"
        );

        let mut rows_written = 0usize;
        let mut chunk_count_mismatches = 0u64;
        for cell in config.cells() {
            self.transition(SweepState::RunningCell);
            let summary = self.run_cell(&runner, &cell, payloads).await?;

            self.transition(SweepState::CellFinalizing);
            sink.append_row(&ReportRow::from_summary(&cell, &summary))?;
            rows_written += 1;
            chunk_count_mismatches += u64::from(summary.chunk_count_mismatches);
            log_cell_summary(&cell, &summary);
        }
        self.transition(SweepState::Done);

        let outcome = SweepOutcome {
            cells: config.cell_count(),
            rows_written,
            chunk_count_mismatches,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            rows = outcome.rows_written,
            chunk_count_mismatches = outcome.chunk_count_mismatches,
            elapsed = ?outcome.elapsed,
            "Sweep completed"
        );
        Ok(outcome)
    }

    async fn run_cell(
        &mut self,
        runner: &TrialRunner<'_>,
        cell: &SweepCell,
        payloads: &mut dyn PayloadSource,
    ) -> Result<CellSummary> {
        self.accumulator.reset();

        for trial_index in 0..self.config.iterations {
            tracing::info!(
                size = %cell.size_label,
                compaction_level = cell.compaction_level,
                iteration = trial_index,
                "Testing random data"
            );
            let payload = payloads.random_bytes(cell.size_bytes)?;

            self.transition(SweepState::TrialInProgress);
            let trial = runner.run(&payload, cell.compaction_level).await?;
            drop(payload);
            log_trial(&trial);

            if let ChunkCountCheck::Mismatch { expected, observed } = self.accumulator.add(&trial)
            {
                match self.config.consistency {
                    ConsistencyPolicy::Abort => {
                        return Err(Error::Consistency {
                            size_label: cell.size_label.clone(),
                            compaction_level: cell.compaction_level,
                            trial: trial_index,
                            expected,
                            observed,
                        });
                    }
                    ConsistencyPolicy::Warn => tracing::warn!(
                        size = %cell.size_label,
                        compaction_level = cell.compaction_level,
                        iteration = trial_index,
                        expected,
                        observed,
                        "Total chunks differ from the first trial of this cell"
                    ),
                }
            }
            self.transition(SweepState::RunningCell);
        }

        self.accumulator.finalize(self.config.iterations)
    }
}

fn log_trial(trial: &TrialResult) {
    tracing::info!(
        seconds = trial.duration.as_secs_f64(),
        required_depth = trial.required_depth,
        missed_optimistic_hashing = trial.missed_optimistic_hashing,
        total_chunks = trial.total_chunks,
        "Trial finished"
    );
    for (collisions, buckets) in trial.collision_histogram.iter().enumerate() {
        tracing::debug!(collisions, buckets, "Buckets by collision count");
    }
}

fn log_cell_summary(cell: &SweepCell, summary: &CellSummary) {
    tracing::info!(
        size = %cell.size_label,
        compaction_level = cell.compaction_level,
        average_depth = summary.average_depth,
        average_seconds = summary.average_duration_secs,
        average_missed_optimistic_hashing = summary.average_missed_optimistic_hashing,
        total_chunks = ?summary.total_chunks,
        "Completed cell"
    );
    for (collisions, average) in summary.average_histogram.iter().enumerate() {
        tracing::debug!(collisions, average, "Average buckets by collision count");
    }
}

/// Open the configured report, run the sweep into it and close it.
pub async fn run_sweep(
    config: &SweepConfig,
    evaluator: &dyn ChunkEvaluator,
    payloads: &mut dyn PayloadSource,
) -> Result<SweepOutcome> {
    config.validate()?;
    let mut sink = CsvReportSink::open(&config.report_path, ReportFormat::from_config(config))?;
    let outcome = SweepController::new(config, evaluator)
        .run(payloads, &mut sink)
        .await?;
    sink.close()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadSize;
    use crate::evaluator::EvaluationResult;
    use crate::payload::SeededPayloadSource;
    use async_trait::async_trait;

    struct LengthEvaluator;

    #[async_trait]
    impl ChunkEvaluator for LengthEvaluator {
        fn name(&self) -> &'static str {
            "length"
        }

        async fn evaluate(
            &self,
            payload: &[u8],
            _content_type: &str,
            _file_name: &str,
            compaction_level: u16,
        ) -> Result<EvaluationResult> {
            Ok(EvaluationResult::new(
                payload.len() as u64,
                17 + u32::from(compaction_level),
                0,
                vec![1],
            ))
        }
    }

    #[derive(Default)]
    struct VecSink(Vec<ReportRow>);

    impl ReportSink for VecSink {
        fn append_row(&mut self, row: &ReportRow) -> Result<()> {
            self.0.push(row.clone());
            Ok(())
        }
    }

    fn config() -> SweepConfig {
        SweepConfig {
            sizes: vec![PayloadSize::new(8, "8B"), PayloadSize::new(16, "16B")],
            compaction_levels: vec![0, 3],
            iterations: 2,
            ..SweepConfig::default()
        }
    }

    #[test]
    fn controller_walks_grid_and_ends_done() {
        let config = config();
        let mut controller = SweepController::new(&config, &LengthEvaluator);
        assert_eq!(controller.state(), SweepState::Idle);

        let mut sink = VecSink::default();
        let outcome = futures::executor::block_on(
            controller.run(&mut SeededPayloadSource::new(1), &mut sink),
        )
        .expect("sweep");

        assert_eq!(controller.state(), SweepState::Done);
        assert_eq!(outcome.rows_written, 4);
        assert_eq!(outcome.cells, 4);
        assert_eq!(outcome.chunk_count_mismatches, 0);
        let cells: Vec<(&str, u16, f64)> = sink
            .0
            .iter()
            .map(|r| (r.size_label.as_str(), r.compaction_level, r.average_depth))
            .collect();
        assert_eq!(
            cells,
            vec![("8B", 0, 17.0), ("8B", 3, 20.0), ("16B", 0, 17.0), ("16B", 3, 20.0)]
        );
        assert_eq!(sink.0[2].total_chunks, Some(16));
    }

    #[test]
    fn invalid_config_fails_before_any_cell() {
        let config = SweepConfig {
            iterations: 0,
            ..config()
        };
        let mut sink = VecSink::default();
        let err = futures::executor::block_on(
            SweepController::new(&config, &LengthEvaluator)
                .run(&mut SeededPayloadSource::new(1), &mut sink),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(sink.0.is_empty());
    }
}
