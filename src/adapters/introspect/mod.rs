//! Runtime attribute detection adapters
//!
//! Classes often create attributes inside their constructor instead of declaring
//! them. These detectors scan constructor source text so strict doubles can accept
//! such attributes without an explicit allow-list entry.

mod javascript;
mod python;

pub use javascript::JavaScriptAttrDetector;
pub use python::PythonAttrDetector;

use crate::domain::ports::RuntimeAttrDetector;
use std::collections::BTreeSet;

/// Multi-language detector that routes to language-specific detectors
pub struct UniversalAttrDetector {
    detectors: Vec<Box<dyn RuntimeAttrDetector>>,
}

impl UniversalAttrDetector {
    pub fn new() -> Self {
        Self {
            detectors: vec![Box::new(PythonAttrDetector), Box::new(JavaScriptAttrDetector)],
        }
    }

    /// The detector registered for `language`, if any
    pub fn for_language(&self, language: &str) -> Option<&dyn RuntimeAttrDetector> {
        self.detectors
            .iter()
            .find(|d| d.language() == language)
            .map(|d| d.as_ref())
    }
}

impl Default for UniversalAttrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeAttrDetector for UniversalAttrDetector {
    /// Union of what every language detector finds
    fn detect(&self, source: &str) -> Vec<String> {
        let names: BTreeSet<String> = self
            .detectors
            .iter()
            .flat_map(|d| d.detect(source))
            .collect();
        names.into_iter().collect()
    }

    fn language(&self) -> &str {
        "any"
    }
}
