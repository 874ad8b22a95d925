use at_types::{Coordinate, Cost};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Append-only memo of measured costs, keyed by canonical coordinate.
///
/// Lives exactly as long as one search engine and never evicts; tuning
/// spaces are small enough that unbounded growth is the accepted limit.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CostCache {
    costs: HashMap<String, Cost>,
    #[serde(skip)]
    stats: CacheStats,
}

impl CostCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached cost for a coordinate, counting the lookup as a hit or miss.
    pub fn lookup(&mut self, coord: &Coordinate) -> Option<Cost> {
        match self.costs.get(&coord.key()) {
            Some(cost) => {
                self.stats.hits += 1;
                Some(*cost)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Cost> {
        self.costs.get(key).copied()
    }

    pub fn contains(&self, coord: &Coordinate) -> bool {
        self.costs.contains_key(&coord.key())
    }

    /// Record a measured cost. The first measurement for a key is kept.
    pub fn record(&mut self, key: String, cost: Cost) {
        self.costs.entry(key).or_insert(cost);
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Lookup counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_value() {
        let mut cache = CostCache::new();
        cache.record(Coordinate::new(vec![1, 1]).key(), 3.2);

        assert_eq!(cache.lookup(&Coordinate::new(vec![1, 1])), Some(3.2));
        assert_eq!(cache.lookup(&Coordinate::new(vec![1, 2])), None);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert_eq!(cache.stats().hit_rate(), 0.5);
    }

    #[test]
    fn first_measurement_wins() {
        let mut cache = CostCache::new();
        cache.record("[0]".into(), 1.0);
        cache.record("[0]".into(), 2.0);
        assert_eq!(cache.get("[0]"), Some(1.0));
        assert_eq!(cache.len(), 1);
    }
}
