//! Search run reporting.

use crate::pipeline::PipelineStats;
use at_types::{Coordinate, Cost, ParameterBinding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Summary of one `search()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub id: SearchId,
    pub strategy: String,
    pub space_size: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: PipelineStats,
}

impl SearchReport {
    pub fn new(strategy: impl Into<String>, space_size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            space_size,
            started_at: Utc::now(),
            finished_at: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn mark_finished(&mut self, stats: PipelineStats) {
        self.finished_at = Some(Utc::now());
        self.stats = stats;
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// The best parameters a search found.
///
/// A search over a space with no axes has an empty binding and no cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub binding: ParameterBinding,
    pub cost: Option<Cost>,
    pub coordinate: Option<Coordinate>,
    pub report: SearchReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::ParamValue;

    #[test]
    fn report_lifecycle() {
        let mut report = SearchReport::new("local", 12);
        assert!(report.finished_at.is_none());
        assert!(report.duration_seconds().is_none());

        let stats = PipelineStats {
            batches: 2,
            measured: 9,
            ..PipelineStats::default()
        };
        report.mark_finished(stats);
        assert!(report.finished_at.is_some());
        assert!(report.duration_seconds().unwrap() >= 0.0);
        assert_eq!(report.stats.measured, 9);
    }

    #[test]
    fn outcome_serialization() {
        let mut binding = ParameterBinding::new();
        binding.insert("BLOCK".into(), ParamValue::Int(4));
        let outcome = SearchOutcome {
            binding,
            cost: Some(1.25),
            coordinate: Some(Coordinate::new(vec![2])),
            report: SearchReport::new("exhaustive", 4),
        };

        let json = serde_json::to_string(&outcome).unwrap();
        let back: SearchOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, back);
        assert!(json.contains("\"BLOCK\":4"));
    }
}
