use super::{batch_size_from_config, rng_from_config, update_best, SearchStrategy};
use crate::coord;
use crate::pipeline::Evaluator;
use at_types::{Coordinate, Cost, EngineConfig, SearchSpace, TuneResult};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing::{debug, info};

/// Independent uniform sampling without replacement.
///
/// Samples `batch_size` unvisited coordinates per round until every
/// coordinate has been visited or the budget is exhausted.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    batch_size: Option<usize>,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    /// Options: `seed`, `batch_size` (default: the driver's process count).
    pub fn from_config(config: &EngineConfig) -> TuneResult<Self> {
        Ok(Self {
            batch_size: config.option_usize("batch_size")?,
            rng: rng_from_config(config)?,
        })
    }
}

impl SearchStrategy for RandomSearch {
    fn find_best_coordinate(
        &mut self,
        evaluator: &mut dyn Evaluator,
        space: &SearchSpace,
        config: &EngineConfig,
    ) -> TuneResult<Option<Coordinate>> {
        let size = space.size();
        let batch = match self.batch_size {
            Some(n) => n.max(1),
            None => batch_size_from_config(config)?,
        };

        let mut visited = HashSet::new();
        let mut best: Option<(Coordinate, Cost)> = None;

        while visited.len() < size && !evaluator.budget_exhausted() {
            let mut round = Vec::with_capacity(batch);
            while round.len() < batch && visited.len() < size {
                let coord = coord::random_coordinate(&mut self.rng, space)?;
                if visited.insert(coord.clone()) {
                    round.push(coord);
                }
            }

            let costs = evaluator.costs(&round)?;
            update_best(&mut best, &round, &costs);
            debug!(
                visited = visited.len(),
                best = ?best.as_ref().map(|(_, cost)| *cost),
                "random sampling round"
            );
        }

        info!(
            visited = visited.len(),
            size,
            found = best.is_some(),
            "random search finished"
        );
        Ok(best.map(|(coord, _)| coord))
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetedEvaluator;
    use crate::collaborators::fakes::{self, bowl, coord, Calls};
    use crate::constraint::Constraint;
    use crate::pipeline::EvaluationPipeline;
    use at_types::ParamValue;
    use serde_json::json;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_axis("X", (0..5).map(ParamValue::Int).collect())
            .add_axis("Y", (0..4).map(ParamValue::Int).collect())
    }

    #[test]
    fn unbounded_sampling_visits_every_coordinate_once() {
        let space = space();
        let calls = Calls::default();
        let mut pipeline = EvaluationPipeline::new(
            space.clone(),
            Constraint::always(),
            fakes::collaborators(&calls, bowl),
        );
        let config = EngineConfig::default()
            .with_option("seed", json!(5))
            .with_option("batch_size", json!(6));
        let mut strategy = RandomSearch::from_config(&config).unwrap();

        let best = strategy
            .find_best_coordinate(&mut pipeline, &space, &config)
            .unwrap();
        assert_eq!(best, Some(coord(&[2, 1])));

        let mut keys = calls.keys_run();
        assert_eq!(keys.len(), 20);
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 20);
        assert_eq!(calls.runs(), 4);
    }

    #[test]
    fn respects_run_budget() {
        let space = space();
        let calls = Calls::default();
        let mut pipeline = EvaluationPipeline::new(
            space.clone(),
            Constraint::always(),
            fakes::collaborators(&calls, bowl),
        );
        let config = EngineConfig::default()
            .with_total_runs(5)
            .with_option("seed", json!(9))
            .with_option("batch_size", json!(2));
        let mut strategy = RandomSearch::from_config(&config).unwrap();
        let mut budgeted = BudgetedEvaluator::new(&mut pipeline, &config);

        let best = strategy
            .find_best_coordinate(&mut budgeted, &space, &config)
            .unwrap();
        assert!(best.is_some());
        assert_eq!(calls.keys_run().len(), 5);
    }
}
