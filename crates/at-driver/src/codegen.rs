use at_search::TestCodeGenerator;
use at_types::TuneResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One code variant in a measurement manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub code: String,
}

/// The measurement program handed to the run command: every variant of one
/// batch, sorted by coordinate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub variants: Vec<ManifestEntry>,
}

#[derive(Debug, Default, Clone)]
pub struct ManifestCodeGenerator {
    pretty: bool,
}

impl ManifestCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl TestCodeGenerator for ManifestCodeGenerator {
    fn generate(&mut self, code_map: &BTreeMap<String, String>) -> TuneResult<String> {
        let manifest = Manifest {
            variants: code_map
                .iter()
                .map(|(key, code)| ManifestEntry {
                    key: key.clone(),
                    code: code.clone(),
                })
                .collect(),
        };
        let text = if self.pretty {
            serde_json::to_string_pretty(&manifest)?
        } else {
            serde_json::to_string(&manifest)?
        };
        Ok(text)
    }
}
