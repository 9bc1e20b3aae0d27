//! Integration rules

use async_trait::async_trait;
use rsvp_provider_core::{failed_diagnostics, ProviderConfiguration, ProviderHandle, ValidationResult};

use super::{RuleCategory, RuleDescriptor, Severity, ValidationRule};
use crate::error::Result;

/// Features that only make sense with setup automation attached
const AUTOMATION_FEATURES: &[&str] = &["schema_migrations"];

/// Runs the provider's own diagnostics
pub struct ConnectivityRule {
    descriptor: RuleDescriptor,
}

impl ConnectivityRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "connectivity-test",
                "Connectivity Test",
                RuleCategory::Integration,
                Severity::Error,
            )
            .describe("Runs provider diagnostics and fails on any failed test"),
        }
    }
}

impl Default for ConnectivityRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for ConnectivityRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        provider: &dyn ProviderHandle,
        _config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        let diagnostics = provider.run_diagnostics().await?;
        if diagnostics.is_empty() {
            return Ok(ValidationResult::ok().with_warning("Provider reported no diagnostic tests"));
        }

        let errors = failed_diagnostics(&diagnostics)
            .into_iter()
            .map(|failure| format!("Diagnostic failed: {}", failure))
            .collect();
        Ok(ValidationResult::from_messages(errors, Vec::new()))
    }
}

/// Claimed features against the capabilities the provider exposes
pub struct FeatureCompatibilityRule {
    descriptor: RuleDescriptor,
}

impl FeatureCompatibilityRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "feature-compatibility",
                "Feature Compatibility",
                RuleCategory::Integration,
                Severity::Warning,
            )
            .describe("Compares declared features with exposed capabilities and integration points")
            .optional(),
        }
    }
}

impl Default for FeatureCompatibilityRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for FeatureCompatibilityRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        provider: &dyn ProviderHandle,
        config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        let capabilities = provider.capabilities();
        let mut result = ValidationResult::ok();

        for feature in &config.features {
            if !capabilities.contains(feature) {
                result = result.with_warning(format!(
                    "Feature '{}' is declared but not exposed by the provider",
                    feature
                ));
            } else if AUTOMATION_FEATURES.contains(&feature.as_str())
                && provider.setup_automation().is_none()
            {
                result = result.with_warning(format!(
                    "Feature '{}' needs setup automation, which the provider does not offer",
                    feature
                ));
            }
        }

        if provider.wizard_integration().is_none() {
            result = result.with_warning("Provider exposes no wizard integration");
        }

        Ok(result)
    }
}
