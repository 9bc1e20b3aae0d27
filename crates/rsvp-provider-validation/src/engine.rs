//! Provider validator
//!
//! Runs the registered rules against one provider, in registration order
//! and one at a time, and turns the outcomes into a scored report.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rsvp_provider_core::{
    BoundedHistory, EventBus, PipelineConfig, PipelineEvent, ProviderRegistry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, ValidatorError};
use crate::report::{ValidationReport, ValidationRuleResult};
use crate::rules::{builtin_rules, RuleCategory, RuleDescriptor, Severity, SharedRule};

/// Options for one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationOptions {
    /// Only run rules in these categories
    pub categories: Option<Vec<RuleCategory>>,
    /// Drop rules that are not required
    pub skip_optional: bool,
    /// Keep going after an error-severity rule fails to evaluate
    pub continue_on_error: bool,
}

impl ValidationOptions {
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = RuleCategory>) -> Self {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    pub fn skip_optional(mut self) -> Self {
        self.skip_optional = true;
        self
    }

    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    fn selects(&self, rule: &SharedRule) -> bool {
        if self.skip_optional && !rule.required() {
            return false;
        }
        match &self.categories {
            Some(categories) => categories.contains(&rule.category()),
            None => true,
        }
    }
}

/// Rule engine producing validation reports for registered providers
pub struct ProviderValidator {
    registry: Arc<dyn ProviderRegistry>,
    rules: RwLock<Vec<SharedRule>>,
    history: Mutex<BoundedHistory<ValidationReport>>,
    events: EventBus,
}

impl ProviderValidator {
    /// Create a validator with the built-in rule catalog
    pub fn new(registry: Arc<dyn ProviderRegistry>, events: EventBus, config: &PipelineConfig) -> Self {
        let validator = Self::empty(registry, events, config);
        for rule in builtin_rules() {
            validator.add_validation_rule(rule);
        }
        validator
    }

    /// Create a validator with no rules
    pub fn empty(registry: Arc<dyn ProviderRegistry>, events: EventBus, config: &PipelineConfig) -> Self {
        Self {
            registry,
            rules: RwLock::new(Vec::new()),
            history: Mutex::new(BoundedHistory::new(config.history_limit)),
            events,
        }
    }

    /// Validate a registered provider
    ///
    /// Fails fast, without touching history, when the provider or its
    /// stored configuration cannot be found. Rule failures never abort the
    /// report except when `continue_on_error` is off and an error-severity
    /// rule could not be evaluated.
    pub async fn validate_provider(
        &self,
        provider_name: &str,
        options: &ValidationOptions,
    ) -> Result<ValidationReport> {
        let handle = self
            .registry
            .get_provider(provider_name)
            .ok_or_else(|| ValidatorError::ProviderNotFound(provider_name.to_string()))?;
        let config = self
            .registry
            .get_provider_info(provider_name)
            .ok_or_else(|| ValidatorError::ProviderInfoMissing(provider_name.to_string()))?;

        let rules: Vec<SharedRule> = self
            .rules
            .read()
            .iter()
            .filter(|rule| options.selects(rule))
            .cloned()
            .collect();

        info!(
            provider = %provider_name,
            rules = rules.len(),
            "Starting provider validation"
        );
        self.events.publish(PipelineEvent::ValidationStarted {
            provider_name: provider_name.to_string(),
            at: Utc::now(),
        });

        let mut results = Vec::with_capacity(rules.len());
        for rule in &rules {
            let descriptor = rule.descriptor().clone();
            let started = Instant::now();
            let outcome = rule.validate(handle.as_ref(), &config).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    let evaluated = ValidationRuleResult::evaluated(descriptor, result, elapsed_ms);
                    debug!(
                        provider = %provider_name,
                        rule = %evaluated.rule.id,
                        status = %evaluated.status,
                        elapsed_ms,
                        "Rule evaluated"
                    );
                    results.push(evaluated);
                }
                Err(e) => {
                    warn!(
                        provider = %provider_name,
                        rule = %descriptor.id,
                        error = %e,
                        "Rule could not be evaluated"
                    );
                    let stop = !options.continue_on_error && descriptor.severity == Severity::Error;
                    results.push(ValidationRuleResult::errored(descriptor, e.to_string(), elapsed_ms));
                    if stop {
                        break;
                    }
                }
            }
        }

        let report_id = format!(
            "validation-{}-{}",
            Utc::now().timestamp_millis(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let report = ValidationReport::build(report_id, provider_name, &config.provider_type, results);

        info!(
            provider = %provider_name,
            report_id = %report.report_id,
            result = %report.overall_result,
            compliance = report.compliance_score,
            security = report.security_score,
            performance = report.performance_score,
            "Provider validation finished"
        );

        self.history.lock().push(report.clone());
        self.events.publish(PipelineEvent::ValidationCompleted {
            report_id: report.report_id.clone(),
            provider_name: report.provider_name.clone(),
            overall_result: report.overall_result.to_string(),
            compliance_score: report.compliance_score,
            security_score: report.security_score,
            performance_score: report.performance_score,
        });

        Ok(report)
    }

    /// Append a rule; it runs after every rule registered before it
    pub fn add_validation_rule(&self, rule: SharedRule) {
        debug!(rule = %rule.id(), "Registering validation rule");
        self.rules.write().push(rule);
    }

    /// Remove every rule with this id; returns whether any was removed
    pub fn remove_validation_rule(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|rule| rule.id() != rule_id);
        before != rules.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Descriptors of the registered rules in evaluation order
    pub fn rules(&self) -> Vec<RuleDescriptor> {
        self.rules
            .read()
            .iter()
            .map(|rule| rule.descriptor().clone())
            .collect()
    }

    /// All retained reports, newest first
    pub fn get_validation_history(&self) -> Vec<ValidationReport> {
        self.history.lock().to_vec()
    }

    /// Up to `n` most recent reports, newest first
    pub fn recent_validation_history(&self, n: usize) -> Vec<ValidationReport> {
        self.history.lock().recent(n)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
