//! Validation rule definitions
//!
//! A rule is a stateless check against a registered provider's live handle
//! and its stored configuration. Rules are registered with the validator in
//! a fixed order and evaluated sequentially.

pub mod compliance;
pub mod configuration;
pub mod integration;
pub mod performance;
pub mod security;

use async_trait::async_trait;
use rsvp_provider_core::{ProviderConfiguration, ProviderHandle, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Area of concern a rule covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Credentials, transport encryption, password policy
    Security,
    /// Retention and audit requirements
    Compliance,
    /// Latency and error rate of the running provider
    Performance,
    /// Completeness and sanity of the stored configuration
    Configuration,
    /// Reachability and exposed integration points
    Integration,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleCategory::Security => "security",
            RuleCategory::Compliance => "compliance",
            RuleCategory::Performance => "performance",
            RuleCategory::Configuration => "configuration",
            RuleCategory::Integration => "integration",
        };
        write!(f, "{}", s)
    }
}

/// How much a rule's failure matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Static description of a rule, carried into every report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub required: bool,
}

impl RuleDescriptor {
    /// Create a required rule descriptor
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: RuleCategory,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category,
            severity,
            required: true,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the rule as skippable with `skip_optional`
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Trait for implementing validation rules
///
/// `validate` returns the raw `{valid, errors, warnings}` outcome. An `Err`
/// means the rule could not evaluate the provider at all; the validator
/// records it as a failed rule.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    fn descriptor(&self) -> &RuleDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn category(&self) -> RuleCategory {
        self.descriptor().category
    }

    fn severity(&self) -> Severity {
        self.descriptor().severity
    }

    fn required(&self) -> bool {
        self.descriptor().required
    }

    async fn validate(
        &self,
        provider: &dyn ProviderHandle,
        config: &ProviderConfiguration,
    ) -> Result<ValidationResult>;
}

/// A shared rule for dynamic dispatch
pub type SharedRule = Arc<dyn ValidationRule>;

type RuleFn =
    dyn Fn(&dyn ProviderHandle, &ProviderConfiguration) -> Result<ValidationResult> + Send + Sync;

/// Rule backed by a synchronous closure
///
/// Handy for application-specific checks that only look at the stored
/// configuration or the handle's synchronous accessors.
pub struct FnRule {
    descriptor: RuleDescriptor,
    check: Box<RuleFn>,
}

impl FnRule {
    pub fn new<F>(descriptor: RuleDescriptor, check: F) -> Self
    where
        F: Fn(&dyn ProviderHandle, &ProviderConfiguration) -> Result<ValidationResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            descriptor,
            check: Box::new(check),
        }
    }
}

#[async_trait]
impl ValidationRule for FnRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        provider: &dyn ProviderHandle,
        config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        (self.check)(provider, config)
    }
}

/// The built-in rule catalog in registration order
pub fn builtin_rules() -> Vec<SharedRule> {
    vec![
        Arc::new(security::SecurityConfigRule::new()),
        Arc::new(security::ConnectionSecurityRule::new()),
        Arc::new(configuration::CompletenessRule::new()),
        Arc::new(configuration::SanityRule::new()),
        Arc::new(performance::HealthCheckRule::new()),
        Arc::new(integration::ConnectivityRule::new()),
        Arc::new(integration::FeatureCompatibilityRule::new()),
        Arc::new(compliance::DataRetentionRule::new()),
    ]
}
