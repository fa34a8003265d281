//! Interpreter configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction-time parameters of an interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Visits of a loop head before widening replaces the join.
    pub widening: usize,
    /// Upper bound on the visits of any single node; `None` means unbounded.
    pub max_iterations: Option<usize>,
}

impl InterpreterConfig {
    pub fn with_widening(widening: usize) -> Self {
        Self {
            widening,
            ..Self::default()
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            widening: 3,
            max_iterations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = InterpreterConfig::default();
        assert_eq!(config.widening, 3);
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = InterpreterConfig::from_json(r#"{"max_iterations": 50}"#).unwrap();
        assert_eq!(config.widening, 3);
        assert_eq!(config.max_iterations, Some(50));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"widening": 1}}"#).unwrap();

        let config = InterpreterConfig::from_file(file.path()).unwrap();
        assert_eq!(config, InterpreterConfig::with_widening(1));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = InterpreterConfig::from_json("{widening: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = InterpreterConfig::from_file(Path::new("/nonexistent/ranger.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
