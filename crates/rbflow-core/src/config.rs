//! Analysis configuration
//!
//! Loaded from JSON or TOML. Every field has a default, so partial files are
//! accepted.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for one analysis session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Nesting bound for substitution, globalization and signature
    /// expansion; deeper structure widens to `untyped`
    pub max_type_depth: usize,
    /// Number of box runs between cancellation polls
    pub cancel_check_interval: usize,
    /// Wall-clock budget for one driver pass
    pub timeout_ms: Option<u64>,
    /// Upper bound on per-member argument combinations tried when a union
    /// argument fails every declared overload as a whole
    pub max_overload_combinations: usize,
    /// Emit a diagnostic for reflective calls that degrade to `untyped`
    pub report_reflective_calls: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_type_depth: 5,
            cancel_check_interval: 64,
            timeout_ms: None,
            max_overload_combinations: 32,
            report_reflective_calls: false,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a file; `.toml` files are parsed as TOML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn poll_interval(&self) -> usize {
        self.cancel_check_interval.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_type_depth, 5);
        assert_eq!(config.timeout(), None);
        assert!(!config.report_reflective_calls);
    }

    #[test]
    fn test_partial_json() {
        let config = AnalysisConfig::from_json_str(r#"{"max_type_depth": 3}"#).unwrap();
        assert_eq!(config.max_type_depth, 3);
        assert_eq!(config.cancel_check_interval, 64);
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "timeout_ms = 250\nreport_reflective_calls = true").unwrap();
        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert!(config.report_reflective_calls);
    }

    #[test]
    fn test_zero_interval_still_polls() {
        let config = AnalysisConfig {
            cancel_check_interval: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), 1);
    }
}
