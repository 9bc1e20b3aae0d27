//! Error types for end-to-end workflows
//!
//! The managers report expected failures through their progress objects.
//! The workflows turn a failed terminal status into one of these errors
//! carrying the aggregated messages.

use rsvp_provider_core::{ConfigError, TelemetryError};
use rsvp_provider_validation::ValidatorError;
use thiserror::Error;

/// Errors raised by [`ProviderSetupSystem`](crate::ProviderSetupSystem) workflows
#[derive(Error, Debug)]
pub enum SystemError {
    /// Pre-execution validation rejected the wizard answers
    #[error("Validation failed: {}", .0.join(", "))]
    PreValidationFailed(Vec<String>),

    /// The setup run ended as failed
    #[error("Setup failed: {0}")]
    SetupFailed(String),

    /// The migration run ended as failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Validator lookup failure
    #[error(transparent)]
    Validation(#[from] ValidatorError),

    /// Metrics registry could not be built or rendered
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Pipeline configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SystemError {
    /// Join run errors into a single failure message
    pub fn aggregate(errors: &[String]) -> String {
        if errors.is_empty() {
            "unknown error".to_string()
        } else {
            errors.join("; ")
        }
    }
}

/// Result type alias for system workflows
pub type Result<T> = std::result::Result<T, SystemError>;
