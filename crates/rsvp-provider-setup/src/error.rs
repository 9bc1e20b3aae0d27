//! Error types for setup and migration runs
//!
//! Expected failures end up in a run's `errors` list. These errors carry the
//! reason from the failing step up to the manager that records it.

use rsvp_provider_core::RegistryError;
use thiserror::Error;

/// Errors raised while executing setup or migration steps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// A step handler failed
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// A step id with no registered handler
    #[error("No handler registered for step '{0}'")]
    UnknownStep(String),

    /// A step handler did not finish within the step timeout
    #[error("Step '{step}' timed out after {timeout_ms}ms")]
    StepTimeout { step: String, timeout_ms: u64 },

    /// Registry operation failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Another run already targets this provider name
    #[error("Setup already in progress for provider '{0}'")]
    ProviderBusy(String),

    /// The configuration cannot be used for this run
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SetupError {
    /// Create a step failure
    pub fn step_failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        SetupError::StepFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        SetupError::Configuration(msg.into())
    }

    /// Whether the failing step already recorded this error on the run
    pub fn is_recorded_by_step(&self) -> bool {
        matches!(self, SetupError::StepFailed { .. })
    }
}

/// Result type alias for setup operations
pub type Result<T> = std::result::Result<T, SetupError>;
