//! Error types for the provider core
//!
//! `RegistryError` covers every failure the Provider Registry contract can
//! report. `ConfigError` covers loading pipeline configuration from disk or
//! the environment.

use thiserror::Error;

/// Errors reported by a provider registry or a provider handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No provider is registered under this name
    #[error("Provider not found: {0}")]
    NotFound(String),

    /// A provider is already registered under this name
    #[error("Provider already registered: {0}")]
    AlreadyRegistered(String),

    /// No factory can build providers of this type
    #[error("No provider factory for type: {0}")]
    FactoryNotFound(String),

    /// A registry or provider operation failed
    #[error("{operation} failed for provider '{provider}': {message}")]
    Operation {
        operation: String,
        provider: String,
        message: String,
    },

    /// The registry or provider is not reachable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl RegistryError {
    /// Create an operation error
    pub fn operation(
        operation: impl Into<String>,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::Operation {
            operation: operation.into(),
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the provider simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors raised while loading pipeline configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File access error
    #[error("File error: {0}")]
    FileError(String),

    /// Configuration parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A value is present but out of range
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Unsupported configuration file format
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(format!("TOML error: {}", err))
    }
}
