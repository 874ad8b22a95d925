//! Tuning specification and engine configuration.

use crate::config_error;
use crate::errors::TuneResult;
use crate::space::{Coordinate, SearchSpace};
use crate::value::ParamValue;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Strategy-specific options, keyed by option name.
pub type StrategyOptions = serde_json::Map<String, serde_json::Value>;

fn unbounded() -> i64 {
    -1
}

fn default_algo() -> String {
    "local".to_string()
}

fn default_num_procs() -> usize {
    1
}

/// The configuration surface consumed by the search engine, as produced by
/// the tuning-specification front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSpec {
    #[serde(default)]
    pub axis_names: Option<Vec<String>>,

    #[serde(default)]
    pub axis_val_ranges: Option<Vec<Vec<ParamValue>>>,

    /// Wall-clock limit in seconds; -1 is unbounded.
    #[serde(default = "unbounded")]
    pub search_time_limit: i64,

    /// Maximum number of measured coordinates; -1 is unbounded.
    #[serde(default = "unbounded")]
    pub search_total_runs: i64,

    /// Name of the search strategy ("local", "random", "exhaustive").
    #[serde(default = "default_algo")]
    pub search_algo: String,

    #[serde(default)]
    pub search_opts: StrategyOptions,

    #[serde(default)]
    pub use_parallel_search: bool,

    #[serde(default = "default_num_procs")]
    pub num_procs: usize,

    /// Feasibility expression over axis names; absent means always feasible.
    #[serde(default)]
    pub pparam_constraint: Option<String>,
}

impl TuningSpec {
    pub fn from_json_str(json: &str) -> TuneResult<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn load(path: &Path) -> TuneResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> TuneResult<()> {
        self.search_space().map(|_| ())
    }

    pub fn search_space(&self) -> TuneResult<SearchSpace> {
        SearchSpace::from_ranges(self.axis_names.as_deref(), self.axis_val_ranges.as_deref())
    }

    /// Engine configuration, taking the process count from the run driver.
    pub fn engine_config(&self, driver_num_procs: usize) -> EngineConfig {
        EngineConfig {
            time_limit: self.search_time_limit,
            total_runs: self.search_total_runs,
            strategy_opts: self.search_opts.clone(),
            parallel: self.use_parallel_search,
            num_procs: driver_num_procs.max(1),
        }
    }
}

/// Immutable engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds; -1 is unbounded.
    pub time_limit: i64,
    /// Measured coordinates; -1 is unbounded.
    pub total_runs: i64,
    pub strategy_opts: StrategyOptions,
    pub parallel: bool,
    pub num_procs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_limit: -1,
            total_runs: -1,
            strategy_opts: StrategyOptions::new(),
            parallel: false,
            num_procs: 1,
        }
    }
}

impl EngineConfig {
    pub fn with_time_limit(mut self, seconds: i64) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn with_total_runs(mut self, runs: i64) -> Self {
        self.total_runs = runs;
        self
    }

    pub fn with_parallel(mut self, parallel: bool, num_procs: usize) -> Self {
        self.parallel = parallel;
        self.num_procs = num_procs.max(1);
        self
    }

    pub fn with_option(mut self, name: &str, value: serde_json::Value) -> Self {
        self.strategy_opts.insert(name.to_string(), value);
        self
    }

    /// `None` when the time budget is unbounded (any negative value).
    pub fn time_budget(&self) -> Option<Duration> {
        u64::try_from(self.time_limit).ok().map(Duration::from_secs)
    }

    /// `None` when the run budget is unbounded (any negative value).
    pub fn run_budget(&self) -> Option<usize> {
        usize::try_from(self.total_runs).ok()
    }

    pub fn option_u64(&self, name: &str) -> TuneResult<Option<u64>> {
        match self.strategy_opts.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| config_error!("search option {name} must be a non-negative integer, got {value}")),
        }
    }

    pub fn option_usize(&self, name: &str) -> TuneResult<Option<usize>> {
        self.option_u64(name)?
            .map(|v| {
                usize::try_from(v).map_err(|_| config_error!("search option {name} is too large: {v}"))
            })
            .transpose()
    }

    pub fn option_coordinate(&self, name: &str) -> TuneResult<Option<Coordinate>> {
        match self.strategy_opts.get(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value::<Vec<i64>>(value.clone())
                .map(|c| Some(Coordinate::new(c)))
                .map_err(|_| config_error!("search option {name} must be a list of integers, got {value}")),
        }
    }
}
