//! Runner configuration, loadable from a JSON file and overridden by CLI flags.

use crate::app::async_loop::{DEFAULT_SLOW_CALLBACK_THRESHOLD_MS, LoopConfig};
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Only run tests whose name matches this regex.
    pub filter: Option<String>,
    /// Skip tests whose name matches this regex.
    pub exclude: Option<String>,
    pub fail_fast: bool,
    pub slow_callback_threshold_ms: u64,
    pub slow_callback_is_not_fatal: bool,
    /// Stripped from call sites in failure messages.
    pub trim_path_prefix: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            filter: None,
            exclude: None,
            fail_fast: false,
            slow_callback_threshold_ms: DEFAULT_SLOW_CALLBACK_THRESHOLD_MS,
            slow_callback_is_not_fatal: false,
            trim_path_prefix: None,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            slow_callback_threshold: Duration::from_millis(self.slow_callback_threshold_ms),
            slow_callback_is_not_fatal: self.slow_callback_is_not_fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RunnerConfig = serde_json::from_str(r#"{"fail_fast": true}"#).unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.slow_callback_threshold_ms, 100);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_loop_config() {
        let config = RunnerConfig {
            slow_callback_threshold_ms: 250,
            slow_callback_is_not_fatal: true,
            ..RunnerConfig::default()
        };
        let lc = config.loop_config();
        assert_eq!(lc.slow_callback_threshold, Duration::from_millis(250));
        assert!(lc.slow_callback_is_not_fatal);
    }
}
