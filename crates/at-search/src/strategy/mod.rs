//! Search strategies: the pluggable coordinate-selection algorithms.

mod exhaustive;
mod local;
mod random;

pub use exhaustive::ExhaustiveSearch;
pub use local::{neighbors, LocalSearch};
pub use random::RandomSearch;

use crate::pipeline::Evaluator;
use at_types::{config_error, Coordinate, Cost, EngineConfig, SearchSpace, TuneResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Common trait for all search strategies.
///
/// A strategy explores the space through the evaluator it is given and
/// returns the best coordinate it measured, or `None` if it found no
/// coordinate with a finite cost.
pub trait SearchStrategy {
    fn find_best_coordinate(
        &mut self,
        evaluator: &mut dyn Evaluator,
        space: &SearchSpace,
        config: &EngineConfig,
    ) -> TuneResult<Option<Coordinate>>;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Build a strategy by its configured name.
pub fn strategy_from_config(
    name: &str,
    config: &EngineConfig,
) -> TuneResult<Box<dyn SearchStrategy>> {
    match name.to_ascii_lowercase().as_str() {
        "local" | "localsearch" => Ok(Box::new(LocalSearch::from_config(config)?)),
        "random" => Ok(Box::new(RandomSearch::from_config(config)?)),
        "exhaustive" => Ok(Box::new(ExhaustiveSearch::from_config(config)?)),
        other => Err(config_error!("unknown search algorithm: {other}")),
    }
}

/// Seeded RNG when a `seed` option is present, entropy otherwise.
pub(crate) fn rng_from_config(config: &EngineConfig) -> TuneResult<ChaCha8Rng> {
    Ok(match config.option_u64("seed")? {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    })
}

/// Batch size option, defaulting to the run driver's process count.
pub(crate) fn batch_size_from_config(config: &EngineConfig) -> TuneResult<usize> {
    Ok(config
        .option_usize("batch_size")?
        .unwrap_or(config.num_procs)
        .max(1))
}

/// Fold a round of costs into the best-so-far, keeping the earlier
/// coordinate on ties.
pub(crate) fn update_best(
    best: &mut Option<(Coordinate, Cost)>,
    round: &[Coordinate],
    costs: &HashMap<Coordinate, Cost>,
) {
    for coord in round {
        let Some(&cost) = costs.get(coord) else {
            continue;
        };
        if !cost.is_finite() {
            continue;
        }
        let improves = match best {
            None => true,
            Some((_, best_cost)) => cost < *best_cost,
        };
        if improves {
            *best = Some((coord.clone(), cost));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::{TuneError, INFINITE_COST};
    use serde_json::json;

    #[test]
    fn registry_resolves_names() {
        let config = EngineConfig::default();
        assert_eq!(strategy_from_config("local", &config).unwrap().name(), "local");
        assert_eq!(
            strategy_from_config("LocalSearch", &config).unwrap().name(),
            "local"
        );
        assert_eq!(strategy_from_config("random", &config).unwrap().name(), "random");
        assert_eq!(
            strategy_from_config("exhaustive", &config).unwrap().name(),
            "exhaustive"
        );
        assert!(matches!(
            strategy_from_config("annealing", &config),
            Err(TuneError::Config(_))
        ));
    }

    #[test]
    fn malformed_strategy_options_fail_construction() {
        let config = EngineConfig::default().with_option("distance", json!(0));
        assert!(strategy_from_config("local", &config).is_err());
        let config = EngineConfig::default().with_option("seed", json!(-3));
        assert!(strategy_from_config("random", &config).is_err());
    }

    #[test]
    fn update_best_skips_infinite_and_ties() {
        let a = Coordinate::new(vec![0]);
        let b = Coordinate::new(vec![1]);
        let c = Coordinate::new(vec![2]);
        let costs: HashMap<_, _> = [(a.clone(), INFINITE_COST), (b.clone(), 2.0), (c.clone(), 2.0)]
            .into_iter()
            .collect();

        let mut best = None;
        update_best(&mut best, &[a, b.clone(), c], &costs);
        assert_eq!(best, Some((b, 2.0)));
    }
}
