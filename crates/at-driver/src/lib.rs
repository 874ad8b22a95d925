//! # at-driver
//!
//! Concrete collaborators for the Autotune search engine: a `${NAME}`
//! template transformer, a JSON manifest test-code generator, and a
//! subprocess run driver, plus [`tune`] wiring them to a tuning spec.

mod codegen;
mod runner;
mod transformer;

pub use codegen::{Manifest, ManifestCodeGenerator, ManifestEntry};
pub use runner::CommandRunDriver;
pub use transformer::TemplateTransformer;

use at_search::{Collaborators, SearchEngine, SearchOutcome};
use at_types::{TuneResult, TuningSpec};

/// Tune `fragments` against `spec`, measuring each batch with `command`.
pub fn tune(spec: &TuningSpec, fragments: Vec<String>, command: &str) -> TuneResult<SearchOutcome> {
    let driver =
        CommandRunDriver::new(command).with_parallelism(spec.use_parallel_search, spec.num_procs);
    let collaborators = Collaborators::new(
        fragments,
        Box::new(TemplateTransformer::new()),
        Box::new(ManifestCodeGenerator::new()),
        Box::new(driver),
    );
    let mut engine = SearchEngine::from_spec(spec, collaborators)?;
    engine.search()
}
