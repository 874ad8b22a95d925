use super::{rng_from_config, SearchStrategy};
use crate::coord;
use crate::pipeline::Evaluator;
use at_types::{config_error, Coordinate, Cost, EngineConfig, SearchSpace, TuneResult, INFINITE_COST};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const DEFAULT_START_ATTEMPTS: usize = 100;

/// Every coordinate within `distance` of `center` on each axis, excluding
/// `center` itself and anything outside the space.
///
/// Offsets per axis are enumerated as `0, 1..=d, -1..=-d`, first axis
/// outermost, which fixes tie-breaking among equal-cost neighbors. Each axis
/// only walks the part of that window inside its bounds, so a radius larger
/// than the space yields the whole space.
pub fn neighbors(space: &SearchSpace, center: &Coordinate, distance: usize) -> Vec<Coordinate> {
    let d = i64::try_from(distance).unwrap_or(i64::MAX);

    let mut result: Vec<Vec<i64>> = vec![Vec::new()];
    for (axis, &c) in center.iter().enumerate() {
        let bounds = space.bounds_of(axis);
        let high = c.saturating_add(d).min(bounds.end - 1);
        let low = c.saturating_sub(d).max(bounds.start);
        let points: Vec<i64> = std::iter::once(c)
            .chain(c.saturating_add(1)..=high)
            .chain((low..c).rev())
            .filter(|p| bounds.contains(p))
            .collect();

        let mut next = Vec::with_capacity(result.len() * points.len());
        for existing in &result {
            for &p in &points {
                let mut coord = existing.clone();
                coord.push(p);
                next.push(coord);
            }
        }
        result = next;
    }

    result
        .into_iter()
        .map(Coordinate::new)
        .filter(|coord| coord != center)
        .collect()
}

/// Greedy neighborhood hill climbing.
///
/// Each round prices the whole neighborhood of the current center in one
/// batch and moves to the strictly cheapest neighbor; it stops at a local
/// minimum or when the budget is exhausted.
#[derive(Debug, Clone)]
pub struct LocalSearch {
    distance: usize,
    start: Option<Coordinate>,
    start_attempts: usize,
    rng: ChaCha8Rng,
}

impl LocalSearch {
    pub fn new(distance: usize) -> Self {
        Self {
            distance: distance.max(1),
            start: None,
            start_attempts: DEFAULT_START_ATTEMPTS,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn with_start(mut self, start: Coordinate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_start_attempts(mut self, attempts: usize) -> Self {
        self.start_attempts = attempts.max(1);
        self
    }

    /// Options: `distance`, `start`, `seed`, `start_attempts`.
    pub fn from_config(config: &EngineConfig) -> TuneResult<Self> {
        let distance = config.option_usize("distance")?.unwrap_or(1);
        if distance == 0 {
            return Err(config_error!("local search distance must be at least 1"));
        }
        Ok(Self {
            distance,
            start: config.option_coordinate("start")?,
            start_attempts: config
                .option_usize("start_attempts")?
                .unwrap_or(DEFAULT_START_ATTEMPTS)
                .max(1),
            rng: rng_from_config(config)?,
        })
    }

    /// Draw distinct random coordinates, price them in one batch, and start
    /// from the cheapest.
    fn random_start(
        &mut self,
        evaluator: &mut dyn Evaluator,
        space: &SearchSpace,
    ) -> TuneResult<Option<(Coordinate, Cost)>> {
        let wanted = self.start_attempts.min(space.size());
        let mut drawn = HashSet::new();
        let mut candidates = Vec::with_capacity(wanted);
        let mut draws = 0;
        while candidates.len() < wanted && draws < wanted.saturating_mul(20) {
            draws += 1;
            let coord = coord::random_coordinate(&mut self.rng, space)?;
            if drawn.insert(coord.clone()) {
                candidates.push(coord);
            }
        }

        let costs = evaluator.costs(&candidates)?;
        let mut best: Option<(Coordinate, Cost)> = None;
        super::update_best(&mut best, &candidates, &costs);
        Ok(best.or_else(|| candidates.into_iter().next().map(|c| (c, INFINITE_COST))))
    }
}

impl Default for LocalSearch {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SearchStrategy for LocalSearch {
    fn find_best_coordinate(
        &mut self,
        evaluator: &mut dyn Evaluator,
        space: &SearchSpace,
        _config: &EngineConfig,
    ) -> TuneResult<Option<Coordinate>> {
        let (mut center, mut center_cost) = match self.start.clone() {
            Some(start) => {
                if !space.is_in_range(&start) {
                    return Err(config_error!(
                        "local search start coordinate {start} is outside the search space"
                    ));
                }
                let cost = evaluator.cost(&start)?;
                (start, cost)
            }
            None => match self.random_start(evaluator, space)? {
                Some(start) => start,
                None => return Ok(None),
            },
        };
        info!(start = %center, cost = center_cost, distance = self.distance, "local search started");

        loop {
            if evaluator.budget_exhausted() {
                warn!(best = %center, cost = center_cost, "budget exhausted, returning best so far");
                break;
            }

            let neighborhood = neighbors(space, &center, self.distance);
            let costs = evaluator.costs(&neighborhood)?;

            let mut best = (center.clone(), center_cost);
            for coord in &neighborhood {
                let cost = costs.get(coord).copied().unwrap_or(INFINITE_COST);
                if cost < best.1 {
                    best = (coord.clone(), cost);
                }
            }

            if best.0 == center {
                break;
            }
            debug!(from = %center, to = %best.0, cost = best.1, "moved to better neighbor");
            (center, center_cost) = best;
        }

        if !center_cost.is_finite() {
            return Ok(None);
        }
        info!(best = %center, cost = center_cost, "local search converged");
        Ok(Some(center))
    }

    fn name(&self) -> &str {
        "local"
    }
}
