//! Provider Registry contract
//!
//! The pipeline never implements providers itself. It drives them through
//! the operations defined here, keyed by provider name.
//!
//! # Async Design
//!
//! Every operation that may reach a provider (start, health, diagnostics,
//! backups) is async and is a suspension point for the caller. Pure lookups
//! over registry state are synchronous.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::RegistryResult;
use crate::types::{
    AutomationStep, ConfigMap, DetailedHealth, Diagnostics, ProviderConfiguration,
    ProviderHealthCheck, ProviderSummary, ValidationResult, WizardStep,
};

/// Registry of provider instances and factories
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    /// Factory identifiers; a factory matches a type when its id contains it
    fn list_factories(&self) -> Vec<String>;

    /// Whether any factory can build the given provider type
    fn has_factory_for(&self, provider_type: &str) -> bool {
        let wanted = provider_type.to_ascii_lowercase();
        self.list_factories()
            .iter()
            .any(|factory| factory.to_ascii_lowercase().contains(&wanted))
    }

    async fn register_provider(
        &self,
        name: &str,
        provider_type: &str,
        config: &ProviderConfiguration,
    ) -> RegistryResult<()>;

    async fn unregister_provider(&self, name: &str) -> RegistryResult<()>;

    fn has_provider(&self, name: &str) -> bool;

    fn get_provider(&self, name: &str) -> Option<Arc<dyn ProviderHandle>>;

    /// Stored configuration of a registered provider
    fn get_provider_info(&self, name: &str) -> Option<ProviderConfiguration>;

    fn list_providers(&self) -> Vec<ProviderSummary>;

    async fn start_provider(&self, name: &str) -> RegistryResult<()>;

    async fn stop_provider(&self, name: &str) -> RegistryResult<()>;

    async fn check_provider_health(&self, name: &str) -> RegistryResult<ProviderHealthCheck>;

    async fn run_diagnostics(&self, name: &str) -> RegistryResult<Diagnostics>;

    /// Snapshot a provider; returns the backup id
    async fn backup_provider(&self, name: &str) -> RegistryResult<String>;

    async fn restore_provider(&self, name: &str, backup_id: &str) -> RegistryResult<()>;

    /// Shallow-merge a partial config into the stored configuration
    async fn update_provider_config(&self, name: &str, partial: ConfigMap) -> RegistryResult<()>;

    fn get_provider_wizard_steps(&self, provider_type: &str) -> RegistryResult<Vec<WizardStep>>;

    async fn validate_wizard_step(
        &self,
        provider_type: &str,
        step_id: &str,
        step_data: &Value,
    ) -> RegistryResult<ValidationResult>;
}

/// A live provider instance returned by the registry
#[async_trait]
pub trait ProviderHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Capabilities the provider actually exposes
    fn capabilities(&self) -> Vec<String>;

    async fn detailed_health(&self) -> RegistryResult<DetailedHealth>;

    async fn run_diagnostics(&self) -> RegistryResult<Diagnostics>;

    /// Probe one capability; providers without specific probes report success
    async fn probe_capability(&self, capability: &str) -> RegistryResult<bool> {
        let _ = capability;
        Ok(true)
    }

    /// Optional schema/migration automation
    fn setup_automation(&self) -> Option<Arc<dyn SetupAutomation>> {
        None
    }

    /// Optional wizard integration descriptor
    fn wizard_integration(&self) -> Option<WizardIntegration> {
        None
    }
}

/// Setup automation capability (schema creation, migrations)
#[async_trait]
pub trait SetupAutomation: Send + Sync {
    /// Steps this automation wants executed, in order
    fn setup_steps(&self) -> Vec<AutomationStep>;

    async fn create_schema(&self) -> RegistryResult<()>;

    async fn validate_configuration(
        &self,
        config: &ProviderConfiguration,
    ) -> RegistryResult<ValidationResult>;

    async fn run_migrations(&self) -> RegistryResult<()> {
        Ok(())
    }

    /// Execute a provider-specific custom step
    async fn run_custom_step(&self, step_id: &str) -> RegistryResult<()> {
        let _ = step_id;
        Ok(())
    }
}

/// Integration points a provider exposes to the setup wizard
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WizardIntegration {
    pub wizard_steps: Vec<String>,
    pub supports_live_validation: bool,
}
