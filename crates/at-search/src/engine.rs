//! The search engine: owns the pipeline and runs one strategy over it.

use crate::budget::BudgetedEvaluator;
use crate::cache::CostCache;
use crate::collaborators::Collaborators;
use crate::constraint::Constraint;
use crate::pipeline::{EvaluationPipeline, Evaluator, PipelineStats};
use crate::report::{SearchOutcome, SearchReport};
use crate::strategy::{strategy_from_config, SearchStrategy};
use at_types::{
    internal_error, Coordinate, Cost, EngineConfig, ParameterBinding, SearchSpace, TuneError,
    TuneResult, TuningSpec,
};
use std::collections::HashMap;
use tracing::{error, info};

/// Lifecycle of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Configured,
    Terminal,
}

pub struct SearchEngine {
    pipeline: EvaluationPipeline,
    config: EngineConfig,
    strategy: Box<dyn SearchStrategy>,
    state: EngineState,
}

impl SearchEngine {
    pub fn new(
        space: SearchSpace,
        config: EngineConfig,
        constraint: Constraint,
        collaborators: Collaborators,
        strategy: Box<dyn SearchStrategy>,
    ) -> Self {
        Self {
            pipeline: EvaluationPipeline::new(space, constraint, collaborators),
            config,
            strategy,
            state: EngineState::Configured,
        }
    }

    /// Build an engine from a tuning specification. The process count comes
    /// from the run driver and the strategy from `search_algo`.
    pub fn from_spec(spec: &TuningSpec, collaborators: Collaborators) -> TuneResult<Self> {
        let space = spec.search_space()?;
        let config = spec.engine_config(collaborators.driver.num_procs());
        let constraint = Constraint::from_optional(spec.pparam_constraint.as_deref())?;
        let strategy = strategy_from_config(&spec.search_algo, &config)?;
        info!(
            dims = space.dims(),
            size = space.size(),
            strategy = strategy.name(),
            constraint = constraint.source(),
            "search engine configured"
        );
        Ok(Self::new(space, config, constraint, collaborators, strategy))
    }

    pub fn space(&self) -> &SearchSpace {
        self.pipeline.space()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CostCache {
        self.pipeline.cache()
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Costs for a set of coordinates, outside any search budget.
    pub fn costs(&mut self, coords: &[Coordinate]) -> TuneResult<HashMap<Coordinate, Cost>> {
        self.pipeline.costs(coords)
    }

    pub fn cost(&mut self, coord: &Coordinate) -> TuneResult<Cost> {
        self.pipeline.cost(coord)
    }

    pub fn to_binding(&self, coord: &Coordinate) -> TuneResult<ParameterBinding> {
        self.pipeline.space().to_binding(coord)
    }

    /// Run the strategy and return the best parameters found.
    pub fn search(&mut self) -> TuneResult<SearchOutcome> {
        if self.state == EngineState::Terminal {
            return Err(internal_error!("search engine has already run"));
        }
        self.state = EngineState::Terminal;

        let space = self.pipeline.space().clone();
        let mut report = SearchReport::new(self.strategy.name(), space.size());

        if space.dims() == 0 {
            info!("search space is empty, nothing to tune");
            report.mark_finished(self.pipeline.stats());
            return Ok(SearchOutcome {
                binding: ParameterBinding::new(),
                cost: None,
                coordinate: None,
                report,
            });
        }

        info!(
            id = %report.id,
            strategy = self.strategy.name(),
            size = space.size(),
            time_limit = self.config.time_limit,
            total_runs = self.config.total_runs,
            "search started"
        );
        let best = {
            let mut budgeted = BudgetedEvaluator::new(&mut self.pipeline, &self.config);
            self.strategy
                .find_best_coordinate(&mut budgeted, &space, &self.config)?
        };

        let Some(best) = best else {
            error!("strategy found no feasible coordinate");
            return Err(TuneError::SearchExhausted);
        };
        let Some(cost) = self.pipeline.cache().get(&best.key()) else {
            error!(best = %best, "strategy returned a coordinate that was never measured");
            return Err(internal_error!("best coordinate {best} has no cached cost"));
        };
        if !cost.is_finite() {
            error!(best = %best, "strategy returned a coordinate without a finite cost");
            return Err(TuneError::SearchExhausted);
        }
        let binding = space.to_binding(&best)?;

        report.mark_finished(self.pipeline.stats());
        info!(
            best = %best,
            cost,
            measured = report.stats.measured,
            batches = report.stats.batches,
            "search finished"
        );
        Ok(SearchOutcome {
            binding,
            cost: Some(cost),
            coordinate: Some(best),
            report,
        })
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fakes::{self, bowl, coord, never, Calls};
    use crate::strategy::LocalSearch;
    use at_types::{ParamValue, INFINITE_COST};
    use serde_json::json;

    fn spec(json: serde_json::Value) -> TuningSpec {
        TuningSpec::from_json_str(&json.to_string()).unwrap()
    }

    fn bowl_spec() -> serde_json::Value {
        json!({
            "axis_names": ["X", "Y"],
            "axis_val_ranges": [[0, 1, 2, 3, 4], [0, 1, 2, 3]],
            "search_opts": {"start": [4, 3]}
        })
    }

    #[test]
    fn degenerate_space_returns_empty_binding_without_calls() {
        let calls = Calls::default();
        let mut engine = SearchEngine::from_spec(
            &spec(json!({"axis_names": [], "axis_val_ranges": []})),
            fakes::collaborators(&calls, bowl),
        )
        .unwrap();

        let outcome = engine.search().unwrap();
        assert!(outcome.binding.is_empty());
        assert_eq!(outcome.cost, None);
        assert_eq!(calls.total(), 0);
        assert_eq!(engine.state(), EngineState::Terminal);
    }

    #[test]
    fn local_search_finds_bowl_minimum() {
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(bowl_spec()), fakes::collaborators(&calls, bowl))
                .unwrap();
        assert_eq!(engine.config().num_procs, 2);

        let outcome = engine.search().unwrap();
        assert_eq!(outcome.coordinate, Some(coord(&[2, 1])));
        assert_eq!(outcome.cost, Some(0.0));
        assert_eq!(outcome.binding.get("X"), Some(&ParamValue::Int(2)));
        assert_eq!(outcome.binding.get("Y"), Some(&ParamValue::Int(1)));
        assert_eq!(outcome.report.strategy, "local");
        assert_eq!(outcome.report.stats.batches, calls.runs());
        assert!(outcome.report.finished_at.is_some());
    }

    #[test]
    fn final_cost_is_a_cache_hit() {
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(bowl_spec()), fakes::collaborators(&calls, bowl))
                .unwrap();
        engine.search().unwrap();
        let runs = calls.runs();
        assert_eq!(engine.cost(&coord(&[2, 1])).unwrap(), 0.0);
        assert_eq!(calls.runs(), runs);
    }

    /// Returns a fixed coordinate without pricing anything.
    struct Blind(Coordinate);

    impl SearchStrategy for Blind {
        fn find_best_coordinate(
            &mut self,
            _evaluator: &mut dyn Evaluator,
            _space: &SearchSpace,
            _config: &EngineConfig,
        ) -> TuneResult<Option<Coordinate>> {
            Ok(Some(self.0.clone()))
        }

        fn name(&self) -> &str {
            "blind"
        }
    }

    #[test]
    fn unmeasured_best_is_internal_error_without_a_run() {
        let calls = Calls::default();
        let spec = spec(bowl_spec());
        let mut engine = SearchEngine::new(
            spec.search_space().unwrap(),
            EngineConfig::default().with_total_runs(0),
            Constraint::always(),
            fakes::collaborators(&calls, bowl),
            Box::new(Blind(coord(&[2, 1]))),
        );
        assert!(matches!(engine.search(), Err(TuneError::Internal(_))));
        assert_eq!(calls.total(), 0);
    }

    #[test]
    fn axis_without_values_is_exhausted() {
        let calls = Calls::default();
        let space = SearchSpace::new()
            .add_axis("X", vec![ParamValue::Int(1), ParamValue::Int(2)])
            .add_axis("Y", Vec::new());
        let mut engine = SearchEngine::new(
            space,
            EngineConfig::default(),
            Constraint::always(),
            fakes::collaborators(&calls, bowl),
            Box::new(LocalSearch::new(1).with_seed(5)),
        );
        assert!(matches!(engine.search(), Err(TuneError::SearchExhausted)));
        assert_eq!(calls.total(), 0);
    }

    #[test]
    fn infeasible_space_is_exhausted() {
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(bowl_spec()), fakes::collaborators(&calls, never))
                .unwrap();
        assert!(matches!(engine.search(), Err(TuneError::SearchExhausted)));
    }

    #[test]
    fn constraint_pruning_everything_is_exhausted() {
        let mut json = bowl_spec();
        json["pparam_constraint"] = json!("X > 10");
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(json), fakes::collaborators(&calls, bowl)).unwrap();
        assert!(matches!(engine.search(), Err(TuneError::SearchExhausted)));
        assert_eq!(calls.total(), 0);
    }

    #[test]
    fn zero_time_budget_is_exhausted() {
        let mut json = bowl_spec();
        json["search_time_limit"] = json!(0);
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(json), fakes::collaborators(&calls, bowl)).unwrap();
        assert!(matches!(engine.search(), Err(TuneError::SearchExhausted)));
        assert_eq!(calls.runs(), 0);
    }

    #[test]
    fn run_budget_returns_best_so_far() {
        let mut json = bowl_spec();
        json["search_total_runs"] = json!(4);
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(json), fakes::collaborators(&calls, bowl)).unwrap();

        let outcome = engine.search().unwrap();
        assert_eq!(outcome.report.stats.measured, 4);
        assert_eq!(calls.keys_run().len(), 4);
        assert_eq!(outcome.coordinate, Some(coord(&[3, 2])));
        assert_eq!(outcome.cost, Some(2.0));
    }

    #[test]
    fn broken_constraint_is_rejected_at_construction() {
        let mut json = bowl_spec();
        json["pparam_constraint"] = json!("X <=");
        let calls = Calls::default();
        let err = SearchEngine::from_spec(&spec(json), fakes::collaborators(&calls, bowl))
            .unwrap_err();
        assert!(matches!(err, TuneError::ConstraintEvaluation { .. }));
    }

    #[test]
    fn search_runs_once() {
        let calls = Calls::default();
        let mut engine =
            SearchEngine::from_spec(&spec(bowl_spec()), fakes::collaborators(&calls, bowl))
                .unwrap();
        engine.search().unwrap();
        assert!(matches!(engine.search(), Err(TuneError::Internal(_))));
    }

    #[test]
    fn end_to_end_block_unroll_example() {
        let space = SearchSpace::new()
            .add_axis("BLOCK", [1, 2, 4, 8].into_iter().map(ParamValue::Int).collect())
            .add_axis("UNROLL", [1, 2, 4].into_iter().map(ParamValue::Int).collect());
        assert_eq!(space.size(), 12);

        let calls = Calls::default();
        let mut engine = SearchEngine::new(
            space,
            EngineConfig::default(),
            Constraint::always(),
            fakes::collaborators(&calls, |_| 3.2),
            Box::new(LocalSearch::new(1)),
        );

        let binding = engine.to_binding(&coord(&[0, 0])).unwrap();
        assert_eq!(binding.get("BLOCK"), Some(&ParamValue::Int(1)));
        assert_eq!(binding.get("UNROLL"), Some(&ParamValue::Int(1)));

        let costs = engine.costs(&[coord(&[5, 0])]).unwrap();
        assert_eq!(costs[&coord(&[5, 0])], INFINITE_COST);
        assert_eq!(calls.total(), 0);

        engine.costs(&[coord(&[1, 1])]).unwrap();
        let runs = calls.runs();
        let costs = engine.costs(&[coord(&[1, 1])]).unwrap();
        assert_eq!(costs[&coord(&[1, 1])], 3.2);
        assert_eq!(calls.runs(), runs);
    }
}
