//! Run and time budget enforcement around the evaluation pipeline.

use crate::pipeline::{EvaluationPipeline, Evaluator};
use at_types::{Coordinate, Cost, EngineConfig, TuneResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Wraps the pipeline for the duration of one search, so no strategy can
/// overrun `total_runs` or start a batch after `time_limit`.
///
/// A batch already submitted always runs to completion; the time limit only
/// stops new batches from being submitted.
pub struct BudgetedEvaluator<'a> {
    inner: &'a mut EvaluationPipeline,
    started: Instant,
    time_limit: Option<Duration>,
    run_limit: Option<usize>,
    runs_used: usize,
    warned: bool,
}

impl<'a> BudgetedEvaluator<'a> {
    pub fn new(inner: &'a mut EvaluationPipeline, config: &EngineConfig) -> Self {
        Self {
            inner,
            started: Instant::now(),
            time_limit: config.time_budget(),
            run_limit: config.run_budget(),
            runs_used: 0,
            warned: false,
        }
    }

    pub fn runs_used(&self) -> usize {
        self.runs_used
    }

    fn out_of_time(&self) -> bool {
        self.time_limit
            .is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// Coordinates that may still be measured; `None` is unlimited.
    fn allowance(&self) -> Option<usize> {
        if self.out_of_time() {
            return Some(0);
        }
        self.run_limit
            .map(|limit| limit.saturating_sub(self.runs_used))
    }
}

impl Evaluator for BudgetedEvaluator<'_> {
    fn costs(&mut self, coords: &[Coordinate]) -> TuneResult<HashMap<Coordinate, Cost>> {
        let evaluation = self.inner.evaluate_within(coords, self.allowance())?;
        self.runs_used += evaluation.measured;
        if !self.warned && self.budget_exhausted() {
            self.warned = true;
            warn!(
                runs_used = self.runs_used,
                elapsed_secs = self.started.elapsed().as_secs_f64(),
                "search budget exhausted"
            );
        }
        Ok(evaluation.costs)
    }

    fn budget_exhausted(&self) -> bool {
        self.allowance() == Some(0)
    }
}
