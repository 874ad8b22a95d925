//! # at-search
//!
//! Empirical search engine for Autotune.
//!
//! Explores a discrete space of code-generation parameters for the
//! combination with the lowest measured cost. Coordinates are priced through
//! a pipeline that prunes out-of-range and infeasible points, reuses cached
//! measurements, and sends everything else to the run driver in one batch.
//! Strategies (local search, random sampling, exhaustive enumeration) plug in
//! through [`SearchStrategy`].

pub mod coord;

mod budget;
mod cache;
mod collaborators;
mod constraint;
mod engine;
mod pipeline;
mod report;
mod strategy;

pub use budget::BudgetedEvaluator;
pub use cache::{CacheStats, CostCache};
pub use collaborators::{CodeTransformer, CodeVariant, Collaborators, RunDriver, TestCodeGenerator};
pub use constraint::Constraint;
pub use engine::{EngineState, SearchEngine};
pub use pipeline::{Evaluation, EvaluationPipeline, Evaluator, PipelineStats};
pub use report::{SearchId, SearchOutcome, SearchReport};
pub use strategy::{
    neighbors, strategy_from_config, ExhaustiveSearch, LocalSearch, RandomSearch, SearchStrategy,
};
