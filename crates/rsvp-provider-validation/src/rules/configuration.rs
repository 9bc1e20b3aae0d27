//! Configuration rules

use async_trait::async_trait;
use rsvp_provider_core::{defaults_for, ProviderConfiguration, ProviderHandle, ValidationResult};

use super::{RuleCategory, RuleDescriptor, Severity, ValidationRule};
use crate::error::Result;

const MAX_CONNECTIONS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRIES: u64 = 10;

/// Type-specific required fields
pub struct CompletenessRule {
    descriptor: RuleDescriptor,
}

impl CompletenessRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "config-completeness",
                "Configuration Completeness",
                RuleCategory::Configuration,
                Severity::Error,
            )
            .describe("Checks that every field the provider type requires is present"),
        }
    }
}

impl Default for CompletenessRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for CompletenessRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        _provider: &dyn ProviderHandle,
        config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::ok();

        if config.name.trim().is_empty() {
            result = result.with_error("Provider name is empty");
        }

        for field in defaults_for(&config.provider_type).required_fields {
            if !config.has_field(field) {
                result = result.with_error(format!("Required field '{}' is missing", field));
            }
        }

        Ok(result)
    }
}

/// Numeric-range sanity checks
pub struct SanityRule {
    descriptor: RuleDescriptor,
}

impl SanityRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "config-validation",
                "Configuration Values",
                RuleCategory::Configuration,
                Severity::Warning,
            )
            .describe("Flags excessive connection counts, timeouts and retries"),
        }
    }
}

impl Default for SanityRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for SanityRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        _provider: &dyn ProviderHandle,
        config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::ok();

        if let Some(max) = config.get_u64("maxConnections") {
            if max > MAX_CONNECTIONS {
                result = result.with_warning(format!(
                    "maxConnections is {} (recommended at most {})",
                    max, MAX_CONNECTIONS
                ));
            }
        }

        let config_timeout = config.get_u64("connectionTimeoutMs").unwrap_or(0);
        for (label, timeout) in [("timeout", config.timeout_ms), ("connectionTimeoutMs", config_timeout)] {
            if timeout > MAX_TIMEOUT_MS {
                result = result.with_warning(format!(
                    "{} is {}ms (recommended at most {}ms)",
                    label, timeout, MAX_TIMEOUT_MS
                ));
            }
        }

        let retries = u64::from(config.retries).max(config.get_u64("retries").unwrap_or(0));
        if retries > MAX_RETRIES {
            result = result.with_warning(format!(
                "retries is {} (recommended at most {})",
                retries, MAX_RETRIES
            ));
        }

        if let Some(port) = config.get_u64("port") {
            if port == 0 || port > u64::from(u16::MAX) {
                result = result.with_error(format!("Port {} is out of range", port));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_provider_core::{build_configuration, SandboxProvider, WizardData};
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_required_fields_are_listed() {
        let mut wizard = WizardData::new();
        wizard.insert("connection".into(), json!({"host": "db", "password": "secret"}));
        let config = build_configuration("postgresql", "guests-db", &wizard);

        let result = CompletenessRule::new()
            .validate(&SandboxProvider::new(), &config)
            .await
            .unwrap();
        assert_eq!(
            result.errors,
            vec![
                "Required field 'database' is missing".to_string(),
                "Required field 'username' is missing".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_defaults_are_sane() {
        let config = build_configuration("postgresql", "guests-db", &WizardData::new());
        let result = SanityRule::new()
            .validate(&SandboxProvider::new(), &config)
            .await
            .unwrap();
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_excessive_values_warn() {
        let mut wizard = WizardData::new();
        wizard.insert("connection".into(), json!({"maxConnections": 500, "port": 70000}));
        wizard.insert("settings".into(), json!({"timeout": 120000, "retries": 25}));
        let config = build_configuration("mysql", "rsvp", &wizard);

        let result = SanityRule::new()
            .validate(&SandboxProvider::new(), &config)
            .await
            .unwrap();
        assert_eq!(result.warnings.len(), 3);
        assert_eq!(result.errors, vec!["Port 70000 is out of range".to_string()]);
    }
}
