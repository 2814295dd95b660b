//! Broker configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

/// Broker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Capacity of the inbound queue shared by all producers.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Capacity used by [`Broker::endpoint`](crate::Broker::endpoint).
    #[serde(default = "default_endpoint_capacity")]
    pub endpoint_capacity: usize,
}

fn default_inbound_capacity() -> usize {
    100
}

fn default_endpoint_capacity() -> usize {
    64
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            endpoint_capacity: default_endpoint_capacity(),
        }
    }
}

impl BrokerConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a value is invalid.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Check that every capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inbound_capacity == 0 {
            return Err(ConfigError::Invalid("inbound_capacity must be at least 1"));
        }
        if self.endpoint_capacity == 0 {
            return Err(ConfigError::Invalid("endpoint_capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.inbound_capacity, 100);
        assert_eq!(config.endpoint_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let config = BrokerConfig::from_toml("inbound_capacity = 8").unwrap();
        assert_eq!(config.inbound_capacity, 8);
        assert_eq!(config.endpoint_capacity, 64);
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        assert!(matches!(
            BrokerConfig::from_toml("endpoint_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BrokerConfig::from_toml("inbound_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_missing_file() {
        let err = BrokerConfig::from_file("/nonexistent/courier.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
