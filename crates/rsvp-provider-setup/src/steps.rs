//! Setup step catalog and handlers
//!
//! The canonical bring-up sequence for a provider and one handler per step.

use async_trait::async_trait;
use parking_lot::Mutex;
use rsvp_provider_core::defaults::defaults_for;
use rsvp_provider_core::types::failed_diagnostics;
use rsvp_provider_core::{
    AutomationAction, ConnectivityProbe, ProviderConfiguration, ProviderHandle, ProviderRegistry,
    RegistryError, SetupStep,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SetupError};
use crate::executor::{StepExecutor, StepHandler};
use crate::manager::SetupOptions;

pub const VALIDATE_CONFIGURATION: &str = "validate-configuration";
pub const TEST_CONNECTIVITY: &str = "test-connectivity";
pub const CREATE_BACKUP: &str = "create-backup";
pub const REGISTER_PROVIDER: &str = "register-provider";
pub const SETUP_AUTOMATION: &str = "setup-automation";
pub const START_PROVIDER: &str = "start-provider";
pub const RUN_DIAGNOSTICS: &str = "run-diagnostics";
pub const VERIFY_FEATURES: &str = "verify-features";

/// Build the ordered setup step list for a provider type
///
/// List order is a valid topological order of the dependency graph.
pub fn setup_steps(provider_type: &str, options: &SetupOptions) -> Vec<SetupStep> {
    let defaults = defaults_for(provider_type);
    let mut steps = vec![
        SetupStep::new(
            VALIDATE_CONFIGURATION,
            "Validate Configuration",
            "Check that a provider factory exists for the configured type",
        )
        .estimated_secs(10),
        SetupStep::new(
            TEST_CONNECTIVITY,
            "Test Connectivity",
            "Check that the provider endpoint is reachable",
        )
        .depends_on(VALIDATE_CONFIGURATION)
        .estimated_secs(15),
    ];

    let mut register_after = TEST_CONNECTIVITY;
    if options.backup && !options.skip_optional_steps {
        steps.push(
            SetupStep::new(
                CREATE_BACKUP,
                "Create Backup",
                "Snapshot an existing provider with the same name",
            )
            .optional()
            .depends_on(TEST_CONNECTIVITY)
            .estimated_secs(60),
        );
        register_after = CREATE_BACKUP;
    }

    steps.extend([
        SetupStep::new(
            REGISTER_PROVIDER,
            "Register Provider",
            "Register the provider with the registry",
        )
        .depends_on(register_after)
        .estimated_secs(10),
        SetupStep::new(
            SETUP_AUTOMATION,
            "Setup Automation",
            "Run schema creation, configuration checks and migrations",
        )
        .depends_on(REGISTER_PROVIDER)
        .estimated_secs(defaults.automation_secs),
        SetupStep::new(START_PROVIDER, "Start Provider", "Start the provider and read its health")
            .depends_on(SETUP_AUTOMATION)
            .estimated_secs(20),
        SetupStep::new(RUN_DIAGNOSTICS, "Run Diagnostics", "Run the provider's diagnostic tests")
            .depends_on(START_PROVIDER)
            .estimated_secs(30),
        SetupStep::new(
            VERIFY_FEATURES,
            "Verify Features",
            "Probe every capability the provider exposes",
        )
        .optional()
        .depends_on(RUN_DIAGNOSTICS)
        .estimated_secs(30),
    ]);

    if options.skip_optional_steps {
        steps.retain(|step| step.required);
    }
    steps
}

/// State shared by the handlers of one setup run
pub struct SetupContext {
    pub registry: Arc<dyn ProviderRegistry>,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub config: ProviderConfiguration,
    backup_id: Mutex<Option<String>>,
    registered: AtomicBool,
}

impl SetupContext {
    pub fn new(
        registry: Arc<dyn ProviderRegistry>,
        probe: Arc<dyn ConnectivityProbe>,
        config: ProviderConfiguration,
    ) -> Self {
        Self {
            registry,
            probe,
            config,
            backup_id: Mutex::new(None),
            registered: AtomicBool::new(false),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.config.name
    }

    /// Backup taken by the create-backup step, if any
    pub fn backup_id(&self) -> Option<String> {
        self.backup_id.lock().clone()
    }

    /// Whether this run registered the provider
    pub fn registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    fn record_backup(&self, backup_id: String) {
        *self.backup_id.lock() = Some(backup_id);
    }

    fn provider(&self, step: &str) -> Result<Arc<dyn ProviderHandle>> {
        self.registry.get_provider(self.provider_name()).ok_or_else(|| {
            SetupError::step_failed(
                step,
                format!("Provider '{}' is not registered", self.provider_name()),
            )
        })
    }
}

/// Install the handler for every setup step
pub fn register_setup_handlers(executor: &mut StepExecutor<SetupContext>) {
    executor.register(VALIDATE_CONFIGURATION, Arc::new(ValidateConfiguration));
    executor.register(TEST_CONNECTIVITY, Arc::new(TestConnectivity));
    executor.register(CREATE_BACKUP, Arc::new(CreateBackup));
    executor.register(REGISTER_PROVIDER, Arc::new(RegisterProvider));
    executor.register(SETUP_AUTOMATION, Arc::new(RunSetupAutomation));
    executor.register(START_PROVIDER, Arc::new(StartProvider));
    executor.register(RUN_DIAGNOSTICS, Arc::new(RunDiagnostics));
    executor.register(VERIFY_FEATURES, Arc::new(VerifyFeatures));
}

pub struct ValidateConfiguration;

#[async_trait]
impl StepHandler<SetupContext> for ValidateConfiguration {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let provider_type = &ctx.config.provider_type;
        let factory = ctx
            .registry
            .list_factories()
            .into_iter()
            .find(|f| f.to_ascii_lowercase().contains(&provider_type.to_ascii_lowercase()))
            .ok_or_else(|| {
                SetupError::step_failed(
                    VALIDATE_CONFIGURATION,
                    format!("No provider factory found for type '{}'", provider_type),
                )
            })?;
        Ok(json!({ "factory": factory }))
    }
}

pub struct TestConnectivity;

#[async_trait]
impl StepHandler<SetupContext> for TestConnectivity {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let sample = ctx.probe.probe(&ctx.config).await?;
        if !sample.reachable {
            return Err(SetupError::step_failed(
                TEST_CONNECTIVITY,
                "Provider endpoint is not reachable",
            ));
        }
        Ok(json!({
            "address": sample.address,
            "latencyMs": sample.latency_ms,
        }))
    }
}

pub struct CreateBackup;

#[async_trait]
impl StepHandler<SetupContext> for CreateBackup {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let name = ctx.provider_name();
        if !ctx.registry.has_provider(name) {
            return Ok(json!({ "backupId": null }));
        }
        let backup_id = ctx.registry.backup_provider(name).await?;
        tracing::info!(provider = %name, backup_id = %backup_id, "Backed up existing provider");
        ctx.record_backup(backup_id.clone());
        Ok(json!({ "backupId": backup_id }))
    }
}

pub struct RegisterProvider;

#[async_trait]
impl StepHandler<SetupContext> for RegisterProvider {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let name = ctx.provider_name();
        // An existing provider is only replaced once it has been backed up
        if ctx.backup_id().is_some() && ctx.registry.has_provider(name) {
            ctx.registry.unregister_provider(name).await?;
        }
        ctx.registry
            .register_provider(name, &ctx.config.provider_type, &ctx.config)
            .await?;
        ctx.registered.store(true, Ordering::SeqCst);
        Ok(json!({ "registered": name }))
    }
}

pub struct RunSetupAutomation;

#[async_trait]
impl StepHandler<SetupContext> for RunSetupAutomation {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let provider = ctx.provider(SETUP_AUTOMATION)?;
        let Some(automation) = provider.setup_automation() else {
            return Ok(json!({ "steps": [] }));
        };

        let mut executed = Vec::new();
        for step in automation.setup_steps() {
            tracing::debug!(provider = %ctx.provider_name(), automation_step = %step.id, "Running automation step");
            match &step.action {
                AutomationAction::CreateSchema => automation.create_schema().await?,
                AutomationAction::ValidateConfiguration => {
                    let result = automation.validate_configuration(&ctx.config).await?;
                    if !result.valid {
                        return Err(SetupError::step_failed(
                            SETUP_AUTOMATION,
                            format!("Configuration rejected: {}", result.errors.join("; ")),
                        ));
                    }
                }
                AutomationAction::RunMigrations => automation.run_migrations().await?,
                AutomationAction::Custom(id) => automation.run_custom_step(id).await?,
            }
            executed.push(step.id);
        }
        Ok(json!({ "steps": executed }))
    }
}

pub struct StartProvider;

#[async_trait]
impl StepHandler<SetupContext> for StartProvider {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let name = ctx.provider_name();
        ctx.registry.start_provider(name).await?;
        let health = ctx.registry.check_provider_health(name).await?;
        Ok(json!({
            "started": true,
            "health": health,
        }))
    }
}

pub struct RunDiagnostics;

#[async_trait]
impl StepHandler<SetupContext> for RunDiagnostics {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let diagnostics = ctx.registry.run_diagnostics(ctx.provider_name()).await?;
        let failed = failed_diagnostics(&diagnostics);
        if !failed.is_empty() {
            return Err(SetupError::step_failed(
                RUN_DIAGNOSTICS,
                format!("Diagnostics failed: {}", failed.join("; ")),
            ));
        }
        serde_json::to_value(&diagnostics)
            .map_err(|e| SetupError::step_failed(RUN_DIAGNOSTICS, e.to_string()))
    }
}

pub struct VerifyFeatures;

#[async_trait]
impl StepHandler<SetupContext> for VerifyFeatures {
    async fn run(&self, ctx: &SetupContext) -> Result<Value> {
        let provider = ctx.provider(VERIFY_FEATURES)?;
        let mut verified = Vec::new();
        let mut failed = Vec::new();
        for capability in provider.capabilities() {
            match provider.probe_capability(&capability).await {
                Ok(true) => verified.push(capability),
                Ok(false) => failed.push(capability),
                Err(RegistryError::NotFound(_)) => failed.push(capability),
                Err(e) => return Err(e.into()),
            }
        }
        if !failed.is_empty() {
            return Err(SetupError::step_failed(
                VERIFY_FEATURES,
                format!("Capabilities not working: {}", failed.join(", ")),
            ));
        }
        Ok(json!({ "verified": verified }))
    }
}
