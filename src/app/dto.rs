use crate::domain::errors::MockError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDto {
    /// Error variant name, e.g. `UnexpectedCallArguments`.
    pub kind: String,
    pub message: String,
}

impl FailureDto {
    /// One entry per failure; aggregated failures are flattened.
    pub fn from_error(error: &MockError, trim_prefix: Option<&str>) -> Vec<Self> {
        error
            .failures()
            .into_iter()
            .map(|e| {
                let message = e.to_string();
                Self {
                    kind: e.kind().to_string(),
                    message: match trim_prefix {
                        Some(prefix) if !prefix.is_empty() => message.replace(prefix, ""),
                        _ => message,
                    },
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub name: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureDto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub suite: String,
    pub passed: usize,
    pub failed: usize,
    /// Selected tests not run because of fail-fast.
    pub skipped: usize,
    pub outcomes: Vec<CaseOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
