//! Error types for provider validation
//!
//! Rule outcomes are reported through the [`ValidationReport`](crate::ValidationReport).
//! These errors cover the fail-fast lookups that happen before any rule runs
//! and rule evaluations that could not produce a result at all.

use rsvp_provider_core::RegistryError;
use thiserror::Error;

/// Errors raised by the validator and by individual rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// The registry has no provider under this name
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// The provider is registered but its stored configuration is missing
    #[error("Provider info not found for '{0}'")]
    ProviderInfoMissing(String),

    /// A rule could not evaluate the provider
    #[error("Rule '{rule}' failed: {message}")]
    RuleFailed { rule: String, message: String },

    /// Registry call made by a rule failed
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ValidatorError {
    /// Create a rule failure
    pub fn rule_failed(rule: impl Into<String>, message: impl Into<String>) -> Self {
        ValidatorError::RuleFailed {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Whether the error comes from a missing provider lookup
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            ValidatorError::ProviderNotFound(_) | ValidatorError::ProviderInfoMissing(_)
        )
    }
}

/// Result type alias for validation operations
pub type Result<T> = std::result::Result<T, ValidatorError>;
