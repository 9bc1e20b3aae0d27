//! Compliance rules
//!
//! Guest lists hold personal data, so every provider that stores it is
//! expected to declare a retention period and keep an audit log.

use async_trait::async_trait;
use rsvp_provider_core::{ProviderCategory, ProviderConfiguration, ProviderHandle, ValidationResult};

use super::{RuleCategory, RuleDescriptor, Severity, ValidationRule};
use crate::error::Result;

/// Longest retention accepted without a warning
pub const MAX_RETENTION_DAYS: u64 = 3_650;

const RETENTION_KEYS: &[&str] = &["dataRetentionDays", "retentionDays", "retention.days"];
const AUDIT_KEYS: &[&str] = &["auditLogging", "audit.enabled"];

/// Retention policy and audit logging presence
pub struct DataRetentionRule {
    descriptor: RuleDescriptor,
}

impl DataRetentionRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "data-retention-compliance",
                "Data Retention Compliance",
                RuleCategory::Compliance,
                Severity::Warning,
            )
            .describe("Checks for a data retention policy and audit logging")
            .optional(),
        }
    }
}

impl Default for DataRetentionRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for DataRetentionRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        _provider: &dyn ProviderHandle,
        config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::ok();

        // Auth providers only hold credentials, not guest records
        let stores_guest_data = !matches!(config.category, ProviderCategory::Auth);

        match RETENTION_KEYS.iter().find_map(|key| config.get_u64(key)) {
            Some(0) => {
                result = result.with_warning("Data retention period is zero days");
            }
            Some(days) if days > MAX_RETENTION_DAYS => {
                result = result.with_warning(format!(
                    "Data retention period of {} days exceeds {} days",
                    days, MAX_RETENTION_DAYS
                ));
            }
            Some(_) => {}
            None if stores_guest_data => {
                result = result.with_warning("No data retention policy configured");
            }
            None => {}
        }

        let audit = AUDIT_KEYS.iter().find_map(|key| config.get_bool(key));
        if audit != Some(true) {
            result = result.with_warning("Audit logging is not enabled");
        }

        Ok(result)
    }
}
