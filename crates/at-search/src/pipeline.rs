//! Cost evaluation: range filter, cache, constraint, then one batched run.

use crate::cache::CostCache;
use crate::collaborators::Collaborators;
use crate::constraint::Constraint;
use at_types::{
    driver_error, internal_error, Coordinate, Cost, SearchSpace, TuneError, TuneResult,
    INFINITE_COST,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// What strategies use to price coordinates.
pub trait Evaluator {
    /// Costs for every distinct coordinate in `coords`.
    fn costs(&mut self, coords: &[Coordinate]) -> TuneResult<HashMap<Coordinate, Cost>>;

    /// Cost of a single coordinate.
    fn cost(&mut self, coord: &Coordinate) -> TuneResult<Cost> {
        let costs = self.costs(std::slice::from_ref(coord))?;
        match (costs.len(), costs.get(coord)) {
            (1, Some(cost)) => Ok(*cost),
            (n, _) => Err(internal_error!(
                "expected exactly one cost for {coord}, evaluation returned {n}"
            )),
        }
    }

    /// True once no further coordinates will be measured.
    fn budget_exhausted(&self) -> bool {
        false
    }
}

/// Counters over the lifetime of one pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Batched round trips to the run driver.
    pub batches: usize,
    /// Coordinates measured by the run driver.
    pub measured: usize,
    pub cache_hits: usize,
    pub range_pruned: usize,
    pub constraint_pruned: usize,
    /// Feasible coordinates priced infinite because the budget ran out.
    pub excluded: usize,
}

/// Result of one evaluation round.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub costs: HashMap<Coordinate, Cost>,
    /// Coordinates sent to the run driver in this round.
    pub measured: usize,
}

/// Owns the search space, the constraint, the cost cache, and the
/// collaborators; prices coordinates with at most one run-driver request per
/// call.
pub struct EvaluationPipeline {
    space: SearchSpace,
    constraint: Constraint,
    cache: CostCache,
    collaborators: Collaborators,
    stats: PipelineStats,
}

impl EvaluationPipeline {
    pub fn new(space: SearchSpace, constraint: Constraint, collaborators: Collaborators) -> Self {
        Self {
            space,
            constraint,
            cache: CostCache::new(),
            collaborators,
            stats: PipelineStats::default(),
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn cache(&self) -> &CostCache {
        &self.cache
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn num_procs(&self) -> usize {
        self.collaborators.driver.num_procs()
    }

    /// Price `coords`, measuring at most `allowance` uncached feasible
    /// coordinates (`None` is unlimited). Coordinates beyond the allowance
    /// are priced infinite and are not cached.
    pub fn evaluate_within(
        &mut self,
        coords: &[Coordinate],
        allowance: Option<usize>,
    ) -> TuneResult<Evaluation> {
        let mut costs = HashMap::with_capacity(coords.len());
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for coord in coords {
            if !seen.insert(coord) {
                continue;
            }

            if !self.space.is_in_range(coord) {
                self.stats.range_pruned += 1;
                costs.insert(coord.clone(), INFINITE_COST);
                continue;
            }

            if let Some(cost) = self.cache.lookup(coord) {
                self.stats.cache_hits += 1;
                costs.insert(coord.clone(), cost);
                continue;
            }

            let binding = self.space.to_binding(coord)?;
            if !self.constraint.is_satisfied(&binding)? {
                self.stats.constraint_pruned += 1;
                costs.insert(coord.clone(), INFINITE_COST);
                continue;
            }

            pending.push(coord.clone());
        }

        let admitted = allowance.map_or(pending.len(), |n| n.min(pending.len()));
        let excluded = pending.len() - admitted;
        for coord in pending.drain(admitted..) {
            costs.insert(coord, INFINITE_COST);
        }
        if excluded > 0 {
            self.stats.excluded += excluded;
            debug!(excluded, admitted, "run budget excludes unmeasured coordinates");
        }

        let measured = pending.len();
        if !pending.is_empty() {
            let new_costs = self.measure(&pending)?;
            for (coord, cost) in new_costs {
                self.cache.record(coord.key(), cost);
                costs.insert(coord, cost);
            }
        }

        Ok(Evaluation { costs, measured })
    }

    /// Transform, assemble, and run every coordinate in one request.
    fn measure(&mut self, coords: &[Coordinate]) -> TuneResult<Vec<(Coordinate, Cost)>> {
        let mut code_map = BTreeMap::new();
        for coord in coords {
            let key = coord.key();
            let binding = self.space.to_binding(coord)?;
            let mut variants = self
                .collaborators
                .transformer
                .optimize(&self.collaborators.fragments, &binding)?;
            if variants.len() != 1 {
                return Err(TuneError::TransformAmbiguity {
                    key,
                    variants: variants.len(),
                });
            }
            let variant = variants.remove(0);
            code_map.insert(key, variant.code);
        }
        debug!(
            batch = coords.len(),
            keys = ?code_map.keys().collect::<Vec<_>>(),
            "submitting measurement batch"
        );

        let program = self.collaborators.generator.generate(&code_map)?;
        let mut reported = self.collaborators.driver.run(&program)?;
        self.stats.batches += 1;
        self.stats.measured += coords.len();

        let mut results = Vec::with_capacity(coords.len());
        for coord in coords {
            let key = coord.key();
            let cost = reported
                .remove(&key)
                .ok_or_else(|| driver_error!("run driver returned no cost for {key}"))?;
            if cost.is_nan() || cost < 0.0 {
                return Err(driver_error!("run driver returned invalid cost {cost} for {key}"));
            }
            results.push((coord.clone(), cost));
        }
        if !reported.is_empty() {
            warn!(
                extra = ?reported.keys().collect::<Vec<_>>(),
                "run driver returned costs for keys that were not submitted"
            );
        }
        Ok(results)
    }
}

impl Evaluator for EvaluationPipeline {
    fn costs(&mut self, coords: &[Coordinate]) -> TuneResult<HashMap<Coordinate, Cost>> {
        Ok(self.evaluate_within(coords, None)?.costs)
    }
}

impl std::fmt::Debug for EvaluationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationPipeline")
            .field("dims", &self.space.dims())
            .field("constraint", &self.constraint.source())
            .field("cached", &self.cache.len())
            .field("stats", &self.stats)
            .finish()
    }
}
