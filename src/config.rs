//! Machine configuration.

use crate::cpu::MAX_CELLS;
use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

/// Default number of memory cells.
pub const DEFAULT_MEMORY_SIZE: usize = 256;

/// Default micro-step budget for unattended runs.
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Settings shared by the CLI, debugger and bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Number of memory cells (N), from 1 to [`MAX_CELLS`].
    pub memory_size: usize,
    /// Micro-steps a `run` may take before giving up.
    pub max_steps: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl MachineConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::Invalid("memory_size must be at least 1".into()));
        }
        if self.memory_size > MAX_CELLS {
            return Err(ConfigError::Invalid(format!(
                "memory_size {} exceeds the addressable {} cells",
                self.memory_size, MAX_CELLS
            )));
        }
        Ok(())
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = MachineConfig::from_json(r#"{ "memory_size": 16 }"#).unwrap();
        assert_eq!(config.memory_size, 16);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_zero_memory_invalid() {
        let err = MachineConfig::from_json(r#"{ "memory_size": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_memory_size_upper_bound() {
        let huge = MachineConfig { memory_size: usize::MAX, ..MachineConfig::default() };
        assert!(matches!(huge.validate(), Err(ConfigError::Invalid(_))));

        let max = MachineConfig { memory_size: MAX_CELLS, ..MachineConfig::default() };
        assert!(max.validate().is_ok());

        let err = MachineConfig::from_json(r#"{ "memory_size": 16777217 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            MachineConfig::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }
}
