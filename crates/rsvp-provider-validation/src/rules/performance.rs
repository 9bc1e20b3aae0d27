//! Performance rules

use async_trait::async_trait;
use rsvp_provider_core::{HealthState, ProviderConfiguration, ProviderHandle, ValidationResult};

use super::{RuleCategory, RuleDescriptor, Severity, ValidationRule};
use crate::error::Result;

/// Response time above which a warning is raised
pub const SLOW_RESPONSE_MS: f64 = 1_000.0;
/// Response time above which the provider is considered unusable
pub const CRITICAL_RESPONSE_MS: f64 = 5_000.0;
/// Error rate above which a warning is raised
pub const HIGH_ERROR_RATE: f64 = 0.05;
/// Error rate above which the provider is considered unusable
pub const CRITICAL_ERROR_RATE: f64 = 0.20;

/// Response-time and error-rate thresholds against the live health snapshot
pub struct HealthCheckRule {
    descriptor: RuleDescriptor,
}

impl HealthCheckRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "performance-health-check",
                "Performance Health Check",
                RuleCategory::Performance,
                Severity::Warning,
            )
            .describe("Checks response time and error rate reported by the provider")
            .optional(),
        }
    }
}

impl Default for HealthCheckRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for HealthCheckRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    async fn validate(
        &self,
        provider: &dyn ProviderHandle,
        _config: &ProviderConfiguration,
    ) -> Result<ValidationResult> {
        let health = provider.detailed_health().await?;
        let perf = health.performance;
        let mut result = ValidationResult::ok();

        match health.health {
            HealthState::Unhealthy => {
                result = result.with_error("Provider reports itself unhealthy");
            }
            HealthState::Degraded => {
                result = result.with_warning("Provider reports degraded health");
            }
            HealthState::Healthy | HealthState::Unknown => {}
        }

        if perf.response_time_ms > CRITICAL_RESPONSE_MS {
            result = result.with_error(format!(
                "Response time {:.0}ms exceeds {:.0}ms",
                perf.response_time_ms, CRITICAL_RESPONSE_MS
            ));
        } else if perf.response_time_ms > SLOW_RESPONSE_MS {
            result = result.with_warning(format!(
                "High response time: {:.0}ms",
                perf.response_time_ms
            ));
        }

        if perf.error_rate > CRITICAL_ERROR_RATE {
            result = result.with_error(format!(
                "Error rate {:.1}% exceeds {:.1}%",
                perf.error_rate * 100.0,
                CRITICAL_ERROR_RATE * 100.0
            ));
        } else if perf.error_rate > HIGH_ERROR_RATE {
            result = result.with_warning(format!("High error rate: {:.1}%", perf.error_rate * 100.0));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_provider_core::{build_configuration, SandboxProvider, WizardData};

    async fn run(provider: SandboxProvider) -> ValidationResult {
        let config = build_configuration("sqlite", "rsvp", &WizardData::new());
        HealthCheckRule::new().validate(&provider, &config).await.unwrap()
    }

    #[tokio::test]
    async fn test_fast_provider_passes() {
        let result = run(SandboxProvider::new()).await;
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_slow_provider_warns() {
        let result = run(SandboxProvider::new().with_performance(1_500.0, 0.08)).await;
        assert!(result.valid);
        assert_eq!(
            result.warnings,
            vec!["High response time: 1500ms".to_string(), "High error rate: 8.0%".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unhealthy_provider_errors() {
        let result = run(
            SandboxProvider::new()
                .with_health(HealthState::Unhealthy)
                .with_performance(6_000.0, 0.0),
        )
        .await;
        assert_eq!(result.errors.len(), 2);
    }
}
