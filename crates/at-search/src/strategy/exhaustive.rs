use super::{batch_size_from_config, update_best, SearchStrategy};
use crate::pipeline::Evaluator;
use at_types::{Coordinate, Cost, EngineConfig, SearchSpace, TuneResult};
use tracing::info;

/// Row-major enumeration of the whole space (last axis fastest), priced
/// `batch_size` coordinates per round.
#[derive(Debug, Clone, Default)]
pub struct ExhaustiveSearch {
    batch_size: Option<usize>,
}

impl ExhaustiveSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options: `batch_size` (default: the driver's process count).
    pub fn from_config(config: &EngineConfig) -> TuneResult<Self> {
        Ok(Self {
            batch_size: config.option_usize("batch_size")?,
        })
    }
}

/// Advance `coord` to the next row-major position; false after the last one.
fn advance(coord: &mut [i64], space: &SearchSpace) -> bool {
    for axis in (0..coord.len()).rev() {
        coord[axis] += 1;
        if coord[axis] < space.cardinality(axis) as i64 {
            return true;
        }
        coord[axis] = 0;
    }
    false
}

impl SearchStrategy for ExhaustiveSearch {
    fn find_best_coordinate(
        &mut self,
        evaluator: &mut dyn Evaluator,
        space: &SearchSpace,
        config: &EngineConfig,
    ) -> TuneResult<Option<Coordinate>> {
        if space.size() == 0 {
            return Ok(None);
        }
        let batch = match self.batch_size {
            Some(n) => n.max(1),
            None => batch_size_from_config(config)?,
        };

        let mut cursor = vec![0i64; space.dims()];
        let mut more = true;
        let mut best: Option<(Coordinate, Cost)> = None;
        let mut enumerated = 0usize;

        while more && !evaluator.budget_exhausted() {
            let mut round = Vec::with_capacity(batch);
            while more && round.len() < batch {
                round.push(Coordinate::new(cursor.clone()));
                more = advance(&mut cursor, space);
            }
            enumerated += round.len();
            let costs = evaluator.costs(&round)?;
            update_best(&mut best, &round, &costs);
        }

        info!(enumerated, size = space.size(), "exhaustive search finished");
        Ok(best.map(|(coord, _)| coord))
    }

    fn name(&self) -> &str {
        "exhaustive"
    }
}
