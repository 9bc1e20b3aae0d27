//! In-process sandbox registry
//!
//! A complete implementation of the registry contract that keeps providers
//! in memory. Used for dry runs from the CLI and throughout the test suites.
//! Any operation can be made to fail on demand, and every call is recorded
//! so callers can assert which operations ran.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::defaults::{defaults_for, is_sensitive_key, SECRETS_KEY, SETTINGS_STEP};
use crate::error::{RegistryError, RegistryResult};
use crate::registry::{ProviderHandle, ProviderRegistry, SetupAutomation, WizardIntegration};
use crate::types::{
    AutomationAction, AutomationStep, ConfigMap, DetailedHealth, DiagnosticResult, Diagnostics,
    HealthState, PerformanceSnapshot, ProviderConfiguration, ProviderHealthCheck, ProviderStatus,
    ProviderSummary, ValidationResult, WizardField, WizardStep,
};

/// Provider types the sandbox has factories for out of the box
pub const SANDBOX_PROVIDER_TYPES: &[&str] = &[
    "postgresql",
    "mysql",
    "mongodb",
    "supabase",
    "firebase",
    "sqlite",
    "auth0",
    "sendgrid",
    "smtp",
    "s3",
    "local-storage",
];

/// Registry operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxOp {
    Register,
    Unregister,
    Start,
    Stop,
    Health,
    Diagnostics,
    Backup,
    Restore,
    UpdateConfig,
    WizardSteps,
    ValidateWizard,
}

impl SandboxOp {
    fn label(&self) -> &'static str {
        match self {
            SandboxOp::Register => "register",
            SandboxOp::Unregister => "unregister",
            SandboxOp::Start => "start",
            SandboxOp::Stop => "stop",
            SandboxOp::Health => "health",
            SandboxOp::Diagnostics => "diagnostics",
            SandboxOp::Backup => "backup",
            SandboxOp::Restore => "restore",
            SandboxOp::UpdateConfig => "update_config",
            SandboxOp::WizardSteps => "wizard_steps",
            SandboxOp::ValidateWizard => "validate_wizard",
        }
    }
}

/// Scripted setup automation
pub struct SandboxAutomation {
    steps: Vec<AutomationStep>,
    schema_failure: Option<String>,
    schema_calls: AtomicUsize,
    migration_calls: AtomicUsize,
}

impl SandboxAutomation {
    /// Automation declaring schema creation, config validation and migrations
    pub fn standard() -> Self {
        Self::with_steps(vec![
            AutomationStep::new("create-schema", "Create schema", AutomationAction::CreateSchema),
            AutomationStep::new(
                "validate-config",
                "Validate configuration",
                AutomationAction::ValidateConfiguration,
            ),
            AutomationStep::new("run-migrations", "Run migrations", AutomationAction::RunMigrations),
        ])
    }

    pub fn with_steps(steps: Vec<AutomationStep>) -> Self {
        Self {
            steps,
            schema_failure: None,
            schema_calls: AtomicUsize::new(0),
            migration_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_schema(mut self, message: impl Into<String>) -> Self {
        self.schema_failure = Some(message.into());
        self
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    pub fn migration_calls(&self) -> usize {
        self.migration_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SetupAutomation for SandboxAutomation {
    fn setup_steps(&self) -> Vec<AutomationStep> {
        self.steps.clone()
    }

    async fn create_schema(&self) -> RegistryResult<()> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        match &self.schema_failure {
            Some(message) => Err(RegistryError::operation("create_schema", "sandbox", message.clone())),
            None => Ok(()),
        }
    }

    async fn validate_configuration(
        &self,
        config: &ProviderConfiguration,
    ) -> RegistryResult<ValidationResult> {
        let mut result = ValidationResult::ok();
        if config.name.trim().is_empty() {
            result = result.with_error("Provider name is empty");
        }
        Ok(result)
    }

    async fn run_migrations(&self) -> RegistryResult<()> {
        self.migration_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Behaviour template for providers created by the sandbox
#[derive(Clone)]
pub struct SandboxProvider {
    name: String,
    capabilities: Option<Vec<String>>,
    failing_capabilities: Vec<String>,
    performance: PerformanceSnapshot,
    health: HealthState,
    diagnostics: Diagnostics,
    diagnostics_error: Option<String>,
    automation: Option<Arc<SandboxAutomation>>,
    wizard_integration: bool,
}

impl Default for SandboxProvider {
    fn default() -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("connection".into(), DiagnosticResult::passed("Connection established"));
        diagnostics.insert("authentication".into(), DiagnosticResult::passed("Credentials accepted"));
        Self {
            name: String::new(),
            capabilities: None,
            failing_capabilities: Vec::new(),
            performance: PerformanceSnapshot {
                response_time_ms: 45.0,
                error_rate: 0.0,
                throughput_per_sec: Some(250.0),
            },
            health: HealthState::Healthy,
            diagnostics,
            diagnostics_error: None,
            automation: None,
            wizard_integration: true,
        }
    }
}

impl SandboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose exactly these capabilities (defaults to the configured features)
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_failing_capability(mut self, capability: impl Into<String>) -> Self {
        self.failing_capabilities.push(capability.into());
        self
    }

    pub fn with_performance(mut self, response_time_ms: f64, error_rate: f64) -> Self {
        self.performance.response_time_ms = response_time_ms;
        self.performance.error_rate = error_rate;
        self
    }

    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }

    pub fn with_diagnostic(mut self, test: impl Into<String>, result: DiagnosticResult) -> Self {
        self.diagnostics.insert(test.into(), result);
        self
    }

    /// Make the provider's own diagnostics call raise an error
    pub fn with_diagnostics_error(mut self, message: impl Into<String>) -> Self {
        self.diagnostics_error = Some(message.into());
        self
    }

    pub fn with_automation(mut self, automation: Arc<SandboxAutomation>) -> Self {
        self.automation = Some(automation);
        self
    }

    pub fn without_wizard_integration(mut self) -> Self {
        self.wizard_integration = false;
        self
    }

    fn instantiate(&self, config: &ProviderConfiguration) -> Self {
        let mut provider = self.clone();
        provider.name = config.name.clone();
        if provider.capabilities.is_none() {
            provider.capabilities = Some(config.features.clone());
        }
        provider
    }
}

#[async_trait]
impl ProviderHandle for SandboxProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone().unwrap_or_default()
    }

    async fn detailed_health(&self) -> RegistryResult<DetailedHealth> {
        Ok(DetailedHealth {
            health: self.health,
            performance: self.performance,
            details: ConfigMap::new(),
        })
    }

    async fn run_diagnostics(&self) -> RegistryResult<Diagnostics> {
        match &self.diagnostics_error {
            Some(message) => Err(RegistryError::operation("diagnostics", &self.name, message.clone())),
            None => Ok(self.diagnostics.clone()),
        }
    }

    async fn probe_capability(&self, capability: &str) -> RegistryResult<bool> {
        Ok(!self.failing_capabilities.iter().any(|c| c == capability))
    }

    fn setup_automation(&self) -> Option<Arc<dyn SetupAutomation>> {
        self.automation
            .clone()
            .map(|automation| automation as Arc<dyn SetupAutomation>)
    }

    fn wizard_integration(&self) -> Option<WizardIntegration> {
        self.wizard_integration.then(|| WizardIntegration {
            wizard_steps: vec!["connection".into(), SETTINGS_STEP.into()],
            supports_live_validation: true,
        })
    }
}

struct SandboxEntry {
    config: ProviderConfiguration,
    status: ProviderStatus,
    handle: Arc<SandboxProvider>,
}

/// In-memory provider registry
pub struct SandboxRegistry {
    factories: Vec<String>,
    providers: DashMap<String, SandboxEntry>,
    templates: DashMap<String, SandboxProvider>,
    backups: DashMap<String, ProviderConfiguration>,
    failures: DashMap<SandboxOp, String>,
    wizard_steps: DashMap<String, Vec<WizardStep>>,
    calls: Mutex<Vec<String>>,
    backup_counter: AtomicUsize,
}

impl Default for SandboxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxRegistry {
    /// Sandbox with factories for every built-in provider type
    pub fn new() -> Self {
        Self::with_factories(
            SANDBOX_PROVIDER_TYPES
                .iter()
                .map(|t| format!("{}-factory", t)),
        )
    }

    pub fn with_factories<I, S>(factories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            factories: factories.into_iter().map(Into::into).collect(),
            providers: DashMap::new(),
            templates: DashMap::new(),
            backups: DashMap::new(),
            failures: DashMap::new(),
            wizard_steps: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            backup_counter: AtomicUsize::new(0),
        }
    }

    /// Behaviour for providers of a type registered from now on
    pub fn set_template(&self, provider_type: &str, template: SandboxProvider) {
        self.templates.insert(provider_type.to_string(), template);
    }

    /// Override the wizard definition for a type
    pub fn set_wizard_steps(&self, provider_type: &str, steps: Vec<WizardStep>) {
        self.wizard_steps.insert(provider_type.to_string(), steps);
    }

    /// Make an operation fail until cleared
    pub fn fail_on(&self, op: SandboxOp, message: impl Into<String>) {
        self.failures.insert(op, message.into());
    }

    pub fn clear_failure(&self, op: SandboxOp) {
        self.failures.remove(&op);
    }

    /// Register a provider directly, bypassing the failure switches
    pub fn seed_provider(&self, config: ProviderConfiguration, status: ProviderStatus) {
        let template = self.template_for(&config.provider_type);
        let handle = Arc::new(template.instantiate(&config));
        self.providers.insert(
            config.name.clone(),
            SandboxEntry {
                config,
                status,
                handle,
            },
        );
    }

    /// Every recorded call as `operation:provider`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, op: SandboxOp, name: &str) -> bool {
        let needle = format!("{}:{}", op.label(), name);
        self.calls.lock().iter().any(|call| call == &needle)
    }

    pub fn provider_status(&self, name: &str) -> Option<ProviderStatus> {
        self.providers.get(name).map(|entry| entry.status)
    }

    pub fn backup_count(&self) -> usize {
        self.backups.len()
    }

    fn record(&self, op: SandboxOp, name: &str) -> RegistryResult<()> {
        self.calls.lock().push(format!("{}:{}", op.label(), name));
        match self.failures.get(&op) {
            Some(message) => Err(RegistryError::operation(op.label(), name, message.value().clone())),
            None => Ok(()),
        }
    }

    fn template_for(&self, provider_type: &str) -> SandboxProvider {
        self.templates
            .get(provider_type)
            .map(|t| t.value().clone())
            .unwrap_or_default()
    }

    fn default_wizard_steps(provider_type: &str) -> Vec<WizardStep> {
        let defaults = defaults_for(provider_type);
        let fields = defaults
            .required_fields
            .iter()
            .map(|field| {
                let field = WizardField::required(*field);
                if is_sensitive_key(&field.name) {
                    field.secret()
                } else {
                    field
                }
            })
            .chain(std::iter::once(WizardField::optional("name")))
            .collect();

        vec![
            WizardStep {
                id: "connection".into(),
                title: "Connection details".into(),
                required: true,
                fields,
            },
            WizardStep {
                id: SETTINGS_STEP.into(),
                title: "Operational settings".into(),
                required: false,
                fields: vec![
                    WizardField::optional("autoStart"),
                    WizardField::optional("priority"),
                    WizardField::optional("timeout"),
                    WizardField::optional("retries"),
                ],
            },
        ]
    }
}

fn field_present(data: &Value, field: &str) -> bool {
    let present = |v: Option<&Value>| match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    };
    present(data.get(field)) || present(data.get(SECRETS_KEY).and_then(|s| s.get(field)))
}

#[async_trait]
impl ProviderRegistry for SandboxRegistry {
    fn list_factories(&self) -> Vec<String> {
        self.factories.clone()
    }

    async fn register_provider(
        &self,
        name: &str,
        provider_type: &str,
        config: &ProviderConfiguration,
    ) -> RegistryResult<()> {
        self.record(SandboxOp::Register, name)?;
        if !self.has_factory_for(provider_type) {
            return Err(RegistryError::FactoryNotFound(provider_type.to_string()));
        }
        if self.providers.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }

        let mut stored = config.clone();
        stored.name = name.to_string();
        self.seed_provider(stored, ProviderStatus::Registered);
        Ok(())
    }

    async fn unregister_provider(&self, name: &str) -> RegistryResult<()> {
        self.record(SandboxOp::Unregister, name)?;
        self.providers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    fn get_provider(&self, name: &str) -> Option<Arc<dyn ProviderHandle>> {
        self.providers
            .get(name)
            .map(|entry| entry.handle.clone() as Arc<dyn ProviderHandle>)
    }

    fn get_provider_info(&self, name: &str) -> Option<ProviderConfiguration> {
        self.providers.get(name).map(|entry| entry.config.clone())
    }

    fn list_providers(&self) -> Vec<ProviderSummary> {
        let mut providers: Vec<_> = self
            .providers
            .iter()
            .map(|entry| ProviderSummary {
                name: entry.key().clone(),
                provider_type: entry.config.provider_type.clone(),
                category: entry.config.category,
                status: entry.status,
                enabled: entry.config.enabled,
            })
            .collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        providers
    }

    async fn start_provider(&self, name: &str) -> RegistryResult<()> {
        self.record(SandboxOp::Start, name)?;
        let mut entry = self
            .providers
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        entry.status = ProviderStatus::Running;
        Ok(())
    }

    async fn stop_provider(&self, name: &str) -> RegistryResult<()> {
        self.record(SandboxOp::Stop, name)?;
        let mut entry = self
            .providers
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        entry.status = ProviderStatus::Stopped;
        Ok(())
    }

    async fn check_provider_health(&self, name: &str) -> RegistryResult<ProviderHealthCheck> {
        self.record(SandboxOp::Health, name)?;
        let (status, handle) = {
            let entry = self
                .providers
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            (entry.status, entry.handle.clone())
        };

        let health = match status {
            ProviderStatus::Running => handle.detailed_health().await?.health,
            ProviderStatus::Error => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        };
        Ok(ProviderHealthCheck {
            health,
            status,
            message: None,
            checked_at: Utc::now(),
        })
    }

    async fn run_diagnostics(&self, name: &str) -> RegistryResult<Diagnostics> {
        self.record(SandboxOp::Diagnostics, name)?;
        let handle = self
            .providers
            .get(name)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        handle.run_diagnostics().await
    }

    async fn backup_provider(&self, name: &str) -> RegistryResult<String> {
        self.record(SandboxOp::Backup, name)?;
        let config = self
            .get_provider_info(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let sequence = self.backup_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let backup_id = format!("backup-{}-{}", name, sequence);
        self.backups.insert(backup_id.clone(), config);
        Ok(backup_id)
    }

    async fn restore_provider(&self, name: &str, backup_id: &str) -> RegistryResult<()> {
        self.record(SandboxOp::Restore, name)?;
        let config = self
            .backups
            .get(backup_id)
            .map(|b| b.value().clone())
            .ok_or_else(|| {
                RegistryError::operation("restore", name, format!("unknown backup {}", backup_id))
            })?;
        let status = self
            .providers
            .remove(name)
            .map(|(_, entry)| entry.status)
            .unwrap_or(ProviderStatus::Stopped);
        self.seed_provider(config, status);
        Ok(())
    }

    async fn update_provider_config(&self, name: &str, partial: ConfigMap) -> RegistryResult<()> {
        self.record(SandboxOp::UpdateConfig, name)?;
        let mut entry = self
            .providers
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        for (key, value) in partial {
            if key == "description" {
                if let Some(description) = value.as_str() {
                    entry.config.description = description.to_string();
                    continue;
                }
            }
            entry.config.config.insert(key, value);
        }
        Ok(())
    }

    fn get_provider_wizard_steps(&self, provider_type: &str) -> RegistryResult<Vec<WizardStep>> {
        self.record(SandboxOp::WizardSteps, provider_type)?;
        if let Some(steps) = self.wizard_steps.get(provider_type) {
            return Ok(steps.value().clone());
        }
        if !self.has_factory_for(provider_type) {
            return Err(RegistryError::FactoryNotFound(provider_type.to_string()));
        }
        Ok(Self::default_wizard_steps(provider_type))
    }

    async fn validate_wizard_step(
        &self,
        provider_type: &str,
        step_id: &str,
        step_data: &Value,
    ) -> RegistryResult<ValidationResult> {
        self.record(SandboxOp::ValidateWizard, provider_type)?;
        let steps = self.get_provider_wizard_steps(provider_type)?;
        let Some(step) = steps.iter().find(|s| s.id == step_id) else {
            return Ok(ValidationResult::ok().with_error(format!("Unknown wizard step '{}'", step_id)));
        };

        let mut result = ValidationResult::ok();
        for field in step.fields.iter().filter(|f| f.required) {
            if !field_present(step_data, &field.name) {
                result = result.with_error(format!("Field '{}' is required", field.name));
            }
        }
        if step_data.get("ssl").and_then(Value::as_bool) == Some(false) {
            result = result.with_warning("SSL is disabled for this connection");
        }
        Ok(result)
    }
}
