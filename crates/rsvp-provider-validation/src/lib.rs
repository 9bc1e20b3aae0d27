//! RSVP Provider Validation
//!
//! Rule-based validation of registered providers. Each run evaluates the
//! registered rules in order and produces a [`ValidationReport`] with an
//! overall verdict, per-rule outcomes, recommendations and three composite
//! scores.
//!
//! ## Scores
//!
//! - **Compliance**: share of compliance rules that passed
//! - **Security**: points per passed or warning security rule, capped at 100
//! - **Performance**: passed plus half of the warnings over all performance rules
//!
//! A category with no evaluated rules scores 100.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rsvp_provider_core::{EventBus, PipelineConfig, SandboxRegistry};
//! use rsvp_provider_validation::{ProviderValidator, ValidationOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> rsvp_provider_validation::Result<()> {
//! let validator = ProviderValidator::new(
//!     Arc::new(SandboxRegistry::new()),
//!     EventBus::default(),
//!     &PipelineConfig::default(),
//! );
//! let report = validator
//!     .validate_provider("guests-db", &ValidationOptions::default())
//!     .await?;
//! println!("{}: security {}", report.overall_result, report.security_score);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod report;
pub mod rules;

pub use engine::{ProviderValidator, ValidationOptions};
pub use error::{Result, ValidatorError};
pub use report::{OverallResult, RuleStatus, ValidationReport, ValidationRuleResult};
pub use rules::{
    builtin_rules, FnRule, RuleCategory, RuleDescriptor, Severity, SharedRule, ValidationRule,
};
