//! Provider setup system
//!
//! Composes the setup manager, the migration manager and the validator into
//! validate, execute, validate workflows. All three share one event bus, so
//! a single subscriber observes the whole pipeline and every event reaches
//! the metrics registry exactly once.

use chrono::{DateTime, Utc};
use rsvp_provider_core::{
    ConnectivityProbe, EventBus, MigrationProgress, PipelineConfig, PipelineEvent, PipelineMetrics,
    ProviderRegistry, RunStatus, SetupProgress, TcpProbe, ValidationResult, WizardData,
};
use rsvp_provider_setup::{AutomatedSetupManager, MigrationManager, MigrationOptions, SetupOptions};
use rsvp_provider_validation::{ProviderValidator, ValidationOptions, ValidationReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::{Result, SystemError};

/// Options for [`ProviderSetupSystem::setup_provider_complete`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompleteSetupOptions {
    #[serde(flatten)]
    pub setup: SetupOptions,
    /// Validate the wizard answers before running anything
    pub validate_before: bool,
    /// Validate the provider once setup completed
    pub validate_after: bool,
    pub validation: ValidationOptions,
}

/// Options for [`ProviderSetupSystem::migrate_provider_complete`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompleteMigrationOptions {
    #[serde(flatten)]
    pub migration: MigrationOptions,
    pub validate_before: bool,
    pub validate_after: bool,
    pub validation: ValidationOptions,
}

/// Everything produced by a complete setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSetup {
    pub pre_validation: Option<ValidationResult>,
    pub setup: SetupProgress,
    pub validation_report: Option<ValidationReport>,
}

/// Everything produced by a complete migration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMigration {
    pub pre_validation: Option<ValidationResult>,
    pub migration: MigrationProgress,
    pub validation_report: Option<ValidationReport>,
}

/// Read-only snapshot of the pipeline for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub active_setups: Vec<SetupProgress>,
    pub active_migrations: Vec<MigrationProgress>,
    pub recent_setups: Vec<SetupProgress>,
    pub recent_migrations: Vec<MigrationProgress>,
    pub recent_validations: Vec<ValidationReport>,
    pub validation_rules: usize,
    pub registered_providers: usize,
    pub generated_at: DateTime<Utc>,
}

/// Facade over setup, migration and validation
pub struct ProviderSetupSystem {
    registry: Arc<dyn ProviderRegistry>,
    setup: AutomatedSetupManager,
    migration: MigrationManager,
    validator: ProviderValidator,
    events: EventBus,
    metrics: Arc<PipelineMetrics>,
    config: PipelineConfig,
}

impl ProviderSetupSystem {
    /// System using TCP reachability checks
    pub fn new(registry: Arc<dyn ProviderRegistry>, config: PipelineConfig) -> Result<Self> {
        let probe = Arc::new(TcpProbe::new(config.connectivity_timeout()));
        Self::with_probe(registry, probe, config)
    }

    /// System with a specific connectivity probe
    pub fn with_probe(
        registry: Arc<dyn ProviderRegistry>,
        probe: Arc<dyn ConnectivityProbe>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let metrics = Arc::new(PipelineMetrics::new()?);
        let events = EventBus::new(config.event_buffer).with_metrics(Arc::clone(&metrics));

        let setup = AutomatedSetupManager::with_parts(
            Arc::clone(&registry),
            probe,
            events.clone(),
            config.clone(),
        );
        let migration = MigrationManager::new(Arc::clone(&registry), events.clone(), &config);
        let validator = ProviderValidator::new(Arc::clone(&registry), events.clone(), &config);

        Ok(Self {
            registry,
            setup,
            migration,
            validator,
            events,
            metrics,
            config,
        })
    }

    /// Pre-validate, set up, then post-validate a provider
    ///
    /// Invalid wizard answers abort the workflow unless
    /// `continue_on_warnings` is set. A failed setup is returned as
    /// [`SystemError::SetupFailed`]. Post-validation problems are logged and
    /// reported but never abort.
    pub async fn setup_provider_complete(
        &self,
        provider_type: &str,
        wizard: &WizardData,
        options: &CompleteSetupOptions,
    ) -> Result<CompleteSetup> {
        let pre_validation = if options.validate_before {
            let result = self.setup.validate_setup(provider_type, wizard).await;
            if !result.valid && !options.setup.continue_on_warnings {
                warn!(provider_type = %provider_type, errors = ?result.errors, "Pre-setup validation failed");
                return Err(SystemError::PreValidationFailed(result.errors));
            }
            Some(result)
        } else {
            None
        };

        let setup = self
            .setup
            .setup_provider(provider_type, wizard, &options.setup)
            .await;
        if setup.status == RunStatus::Failed {
            return Err(SystemError::SetupFailed(SystemError::aggregate(&setup.errors)));
        }

        let validation_report = if options.validate_after
            && !options.setup.validate_only
            && setup.status == RunStatus::Completed
        {
            self.post_validate(&setup.provider_name, &options.validation)
                .await
        } else {
            None
        };

        info!(
            setup_id = %setup.setup_id,
            provider = %setup.provider_name,
            status = %setup.status,
            validated = validation_report.is_some(),
            "Complete setup finished"
        );

        Ok(CompleteSetup {
            pre_validation,
            setup,
            validation_report,
        })
    }

    /// Pre-validate, migrate, then post-validate the new provider
    pub async fn migrate_provider_complete(
        &self,
        source: &str,
        target_type: &str,
        wizard: &WizardData,
        options: &CompleteMigrationOptions,
    ) -> Result<CompleteMigration> {
        let pre_validation = if options.validate_before {
            let result = self
                .migration
                .validate_migration(source, target_type, wizard)
                .await;
            if !result.valid && !options.migration.continue_on_warnings {
                warn!(source = %source, errors = ?result.errors, "Pre-migration validation failed");
                return Err(SystemError::PreValidationFailed(result.errors));
            }
            Some(result)
        } else {
            None
        };

        let migration = self
            .migration
            .migrate_provider(source, target_type, wizard, &options.migration)
            .await;
        if migration.status == RunStatus::Failed {
            return Err(SystemError::MigrationFailed(SystemError::aggregate(
                &migration.errors,
            )));
        }

        let validation_report = if options.validate_after
            && !options.migration.validate_only
            && migration.status == RunStatus::Completed
        {
            self.post_validate(&migration.target_provider, &options.validation)
                .await
        } else {
            None
        };

        Ok(CompleteMigration {
            pre_validation,
            migration,
            validation_report,
        })
    }

    async fn post_validate(
        &self,
        provider_name: &str,
        options: &ValidationOptions,
    ) -> Option<ValidationReport> {
        match self.validator.validate_provider(provider_name, options).await {
            Ok(report) => {
                if report.has_failures() {
                    warn!(
                        provider = %provider_name,
                        result = %report.overall_result,
                        failed_rules = report.failed_rules,
                        "Post-setup validation reported failures"
                    );
                }
                Some(report)
            }
            Err(e) => {
                warn!(provider = %provider_name, error = %e, "Post-setup validation could not run");
                None
            }
        }
    }

    /// Snapshot of active runs, recent history and the rule catalog
    pub fn get_system_status(&self) -> SystemStatus {
        let window = self.config.status_history_window;
        SystemStatus {
            active_setups: self.setup.get_active_setups(),
            active_migrations: self.migration.get_active_migrations(),
            recent_setups: self.setup.recent_setup_history(window),
            recent_migrations: self.migration.recent_migration_history(window),
            recent_validations: self.validator.recent_validation_history(window),
            validation_rules: self.validator.rule_count(),
            registered_providers: self.registry.list_providers().len(),
            generated_at: Utc::now(),
        }
    }

    /// Receive every pipeline event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Prometheus text exposition of the pipeline metrics
    pub fn metrics_text(&self) -> Result<String> {
        Ok(self.metrics.gather_text()?)
    }

    pub fn setup_manager(&self) -> &AutomatedSetupManager {
        &self.setup
    }

    pub fn migration_manager(&self) -> &MigrationManager {
        &self.migration
    }

    pub fn validator(&self) -> &ProviderValidator {
        &self.validator
    }

    pub fn registry(&self) -> &Arc<dyn ProviderRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_provider_core::{SandboxRegistry, StaticProbe};
    use serde_json::json;

    fn system() -> ProviderSetupSystem {
        ProviderSetupSystem::with_probe(
            Arc::new(SandboxRegistry::new()),
            Arc::new(StaticProbe::reachable(3)),
            PipelineConfig::default(),
        )
        .unwrap()
    }

    fn sqlite_wizard() -> WizardData {
        let mut wizard = WizardData::new();
        wizard.insert("connection".into(), json!({"name": "guest-cache", "path": "/tmp/rsvp.db"}));
        wizard
    }

    #[tokio::test]
    async fn test_pre_validation_aborts_before_setup() {
        let system = system();
        let options = CompleteSetupOptions {
            validate_before: true,
            ..Default::default()
        };
        let err = system
            .setup_provider_complete("sqlite", &WizardData::new(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SystemError::PreValidationFailed(_)));
        assert!(system.setup_manager().get_setup_history().is_empty());
    }

    #[tokio::test]
    async fn test_validate_only_skips_post_validation() {
        let system = system();
        let options = CompleteSetupOptions {
            setup: SetupOptions {
                validate_only: true,
                ..Default::default()
            },
            validate_after: true,
            ..Default::default()
        };
        let outcome = system
            .setup_provider_complete("sqlite", &sqlite_wizard(), &options)
            .await
            .unwrap();
        assert_eq!(outcome.setup.status, RunStatus::Completed);
        assert_eq!(outcome.setup.completed_steps, 0);
        assert!(outcome.validation_report.is_none());
    }

    #[test]
    fn test_options_deserialize_flattened() {
        let options: CompleteSetupOptions = serde_json::from_value(json!({
            "backup": true,
            "validateAfter": true,
            "validation": {"skipOptional": true}
        }))
        .unwrap();
        assert!(options.setup.backup);
        assert!(options.validate_after);
        assert!(options.validation.skip_optional);
    }

    #[test]
    fn test_status_of_idle_system() {
        let status = system().get_system_status();
        assert_eq!(status.validation_rules, 8);
        assert!(status.active_setups.is_empty());
        assert!(status.recent_validations.is_empty());
    }
}
