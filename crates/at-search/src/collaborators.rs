//! Interfaces to the external code-transformation / build / run pipeline.

use at_types::{Cost, ParameterBinding, TuneResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One generated code artifact for a parameter binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeVariant {
    pub code: String,
    /// Transformer-specific details (applied binding, transformation notes).
    pub metadata: serde_json::Value,
}

impl CodeVariant {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Turns code fragments plus a parameter binding into code variants.
///
/// The engine requires exactly one variant per call.
pub trait CodeTransformer {
    fn optimize(
        &mut self,
        fragments: &[String],
        binding: &ParameterBinding,
    ) -> TuneResult<Vec<CodeVariant>>;
}

/// Assembles per-coordinate code into a single measurement program.
pub trait TestCodeGenerator {
    fn generate(&mut self, code_map: &BTreeMap<String, String>) -> TuneResult<String>;
}

/// Builds and runs a measurement program, returning a cost per coordinate key.
///
/// A submitted run is never cancelled by the engine.
pub trait RunDriver {
    fn run(&mut self, program: &str) -> TuneResult<HashMap<String, Cost>>;

    /// Number of measurement processes the driver may run concurrently.
    fn num_procs(&self) -> usize {
        1
    }
}

/// Handles to the external collaborators plus the code being tuned.
pub struct Collaborators {
    pub fragments: Vec<String>,
    pub transformer: Box<dyn CodeTransformer>,
    pub generator: Box<dyn TestCodeGenerator>,
    pub driver: Box<dyn RunDriver>,
}

impl Collaborators {
    pub fn new(
        fragments: Vec<String>,
        transformer: Box<dyn CodeTransformer>,
        generator: Box<dyn TestCodeGenerator>,
        driver: Box<dyn RunDriver>,
    ) -> Self {
        Self {
            fragments,
            transformer,
            generator,
            driver,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("fragments", &self.fragments.len())
            .field("num_procs", &self.driver.num_procs())
            .finish_non_exhaustive()
    }
}
