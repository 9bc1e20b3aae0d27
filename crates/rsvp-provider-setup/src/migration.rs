//! Migration Manager
//!
//! Moves a registered provider's portable configuration onto a new provider
//! of another type. Shares the step executor, rollback and run store with
//! the setup manager.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rsvp_provider_core::defaults::{
    apply_wizard_data, base_configuration, defaults_for, is_sensitive_key,
};
use rsvp_provider_core::types::failed_diagnostics;
use rsvp_provider_core::{
    shared, EventBus, MigrationProgress, PipelineConfig, PipelineEvent, ProviderConfiguration,
    ProviderRegistry, RunStatus, RunStore, SetupStep, Shared, ValidationResult, WizardData,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SetupError};
use crate::executor::{ExecutionPolicy, StepExecutor, StepHandler};
use crate::rollback::{roll_back, RollbackPlan};
use crate::wizard::{provider_name, run_id, validate_wizard_data};

pub const VALIDATE_SOURCE: &str = "validate-source";
pub const VALIDATE_TARGET: &str = "validate-target";
pub const BACKUP_SOURCE: &str = "backup-source";
pub const EXPORT_CONFIGURATION: &str = "export-configuration";
pub const REGISTER_TARGET: &str = "register-target";
pub const START_TARGET: &str = "start-target";
pub const VERIFY_TARGET: &str = "verify-target";
pub const DECOMMISSION_SOURCE: &str = "decommission-source";

/// Keys that describe where a provider lives; these never move to the target
const CONNECTION_KEYS: &[&str] = &[
    "host", "port", "url", "endpoint", "uri", "database", "username", "user", "path", "bucket",
    "region", "projectId", "domain", "name",
];

/// Options for one migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationOptions {
    /// Back up the source before touching anything
    pub backup: bool,
    /// Stop and unregister the source once the target is verified
    pub decommission_source: bool,
    pub skip_optional_steps: bool,
    pub continue_on_warnings: bool,
    pub validate_only: bool,
    pub rollback_on_failure: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            backup: true,
            decommission_source: false,
            skip_optional_steps: false,
            continue_on_warnings: false,
            validate_only: false,
            rollback_on_failure: false,
        }
    }
}

/// Build the ordered migration step list
pub fn migration_steps(target_type: &str, options: &MigrationOptions) -> Vec<SetupStep> {
    let automation_secs = defaults_for(target_type).automation_secs;
    let mut steps = vec![
        SetupStep::new(VALIDATE_SOURCE, "Validate Source", "Check the source provider is registered")
            .estimated_secs(5),
        SetupStep::new(VALIDATE_TARGET, "Validate Target", "Check the target type can be created")
            .depends_on(VALIDATE_SOURCE)
            .estimated_secs(5),
    ];

    let mut export_after = VALIDATE_TARGET;
    if options.backup && !options.skip_optional_steps {
        steps.push(
            SetupStep::new(BACKUP_SOURCE, "Backup Source", "Snapshot the source provider")
                .optional()
                .depends_on(VALIDATE_TARGET)
                .estimated_secs(60),
        );
        export_after = BACKUP_SOURCE;
    }

    steps.extend([
        SetupStep::new(
            EXPORT_CONFIGURATION,
            "Export Configuration",
            "Snapshot the source configuration for transfer",
        )
        .depends_on(export_after)
        .estimated_secs(10),
        SetupStep::new(REGISTER_TARGET, "Register Target", "Register the target provider")
            .depends_on(EXPORT_CONFIGURATION)
            .estimated_secs(10 + automation_secs),
        SetupStep::new(START_TARGET, "Start Target", "Start the target provider")
            .depends_on(REGISTER_TARGET)
            .estimated_secs(20),
        SetupStep::new(VERIFY_TARGET, "Verify Target", "Run the target's diagnostics")
            .depends_on(START_TARGET)
            .estimated_secs(30),
    ]);

    if options.decommission_source && !options.skip_optional_steps {
        steps.push(
            SetupStep::new(
                DECOMMISSION_SOURCE,
                "Decommission Source",
                "Stop and unregister the source provider",
            )
            .optional()
            .depends_on(VERIFY_TARGET)
            .estimated_secs(15),
        );
    }
    steps
}

/// Target configuration: type defaults, then portable source keys, then wizard answers
pub fn target_configuration(
    source: &ProviderConfiguration,
    target_type: &str,
    target_name: &str,
    wizard: &WizardData,
) -> ProviderConfiguration {
    let mut target = base_configuration(target_type, target_name);
    for (key, value) in &source.config {
        if CONNECTION_KEYS.contains(&key.as_str()) || is_sensitive_key(key) {
            continue;
        }
        target.config.insert(key.clone(), value.clone());
    }
    target.priority = source.priority;
    target.timeout_ms = source.timeout_ms;
    target.retries = source.retries;
    target.health_check = source.health_check;
    apply_wizard_data(&mut target, wizard);
    target
}

/// State shared by the handlers of one migration run
pub struct MigrationContext {
    pub registry: Arc<dyn ProviderRegistry>,
    pub source: String,
    pub target: String,
    pub target_type: String,
    pub wizard: WizardData,
    backup_id: Mutex<Option<String>>,
    export: Mutex<Option<ProviderConfiguration>>,
    target_registered: AtomicBool,
}

impl MigrationContext {
    pub fn new(
        registry: Arc<dyn ProviderRegistry>,
        source: impl Into<String>,
        target: impl Into<String>,
        target_type: impl Into<String>,
        wizard: WizardData,
    ) -> Self {
        Self {
            registry,
            source: source.into(),
            target: target.into(),
            target_type: target_type.into(),
            wizard,
            backup_id: Mutex::new(None),
            export: Mutex::new(None),
            target_registered: AtomicBool::new(false),
        }
    }

    pub fn backup_id(&self) -> Option<String> {
        self.backup_id.lock().clone()
    }

    pub fn exported(&self) -> Option<ProviderConfiguration> {
        self.export.lock().clone()
    }

    pub fn target_registered(&self) -> bool {
        self.target_registered.load(Ordering::SeqCst)
    }

    fn rollback_plan(&self) -> RollbackPlan {
        let mut plan = RollbackPlan::default();
        if self.target_registered() {
            plan = plan.remove(&self.target);
        }
        if let Some(backup_id) = self.backup_id() {
            plan = plan.restore(&self.source, backup_id);
        }
        plan
    }
}

struct ValidateSource;

#[async_trait]
impl StepHandler<MigrationContext> for ValidateSource {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        if !ctx.registry.has_provider(&ctx.source) {
            return Err(SetupError::step_failed(
                VALIDATE_SOURCE,
                format!("Source provider '{}' is not registered", ctx.source),
            ));
        }
        let info = ctx.registry.get_provider_info(&ctx.source).ok_or_else(|| {
            SetupError::step_failed(
                VALIDATE_SOURCE,
                format!("No configuration available for source provider '{}'", ctx.source),
            )
        })?;
        Ok(json!({ "source": ctx.source, "type": info.provider_type }))
    }
}

struct ValidateTarget;

#[async_trait]
impl StepHandler<MigrationContext> for ValidateTarget {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        if !ctx.registry.has_factory_for(&ctx.target_type) {
            return Err(SetupError::step_failed(
                VALIDATE_TARGET,
                format!("No provider factory found for type '{}'", ctx.target_type),
            ));
        }
        if ctx.registry.has_provider(&ctx.target) {
            return Err(SetupError::step_failed(
                VALIDATE_TARGET,
                format!("Target provider '{}' already exists", ctx.target),
            ));
        }
        Ok(json!({ "target": ctx.target, "type": ctx.target_type }))
    }
}

struct BackupSource;

#[async_trait]
impl StepHandler<MigrationContext> for BackupSource {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        let backup_id = ctx.registry.backup_provider(&ctx.source).await?;
        *ctx.backup_id.lock() = Some(backup_id.clone());
        Ok(json!({ "backupId": backup_id }))
    }
}

struct ExportConfiguration;

#[async_trait]
impl StepHandler<MigrationContext> for ExportConfiguration {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        let info = ctx.registry.get_provider_info(&ctx.source).ok_or_else(|| {
            SetupError::step_failed(
                EXPORT_CONFIGURATION,
                format!("Source provider '{}' disappeared", ctx.source),
            )
        })?;
        let keys = info.config.len();
        *ctx.export.lock() = Some(info);
        Ok(json!({ "exportedKeys": keys }))
    }
}

struct RegisterTarget;

#[async_trait]
impl StepHandler<MigrationContext> for RegisterTarget {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        let source = ctx.exported().ok_or_else(|| {
            SetupError::step_failed(REGISTER_TARGET, "Source configuration was not exported")
        })?;
        let target = target_configuration(&source, &ctx.target_type, &ctx.target, &ctx.wizard);
        ctx.registry
            .register_provider(&ctx.target, &ctx.target_type, &target)
            .await?;
        ctx.target_registered.store(true, Ordering::SeqCst);
        Ok(json!({ "registered": ctx.target, "configKeys": target.config.len() }))
    }
}

struct StartTarget;

#[async_trait]
impl StepHandler<MigrationContext> for StartTarget {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        ctx.registry.start_provider(&ctx.target).await?;
        let health = ctx.registry.check_provider_health(&ctx.target).await?;
        Ok(json!({ "started": true, "health": health }))
    }
}

struct VerifyTarget;

#[async_trait]
impl StepHandler<MigrationContext> for VerifyTarget {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        let diagnostics = ctx.registry.run_diagnostics(&ctx.target).await?;
        let failed = failed_diagnostics(&diagnostics);
        if !failed.is_empty() {
            return Err(SetupError::step_failed(
                VERIFY_TARGET,
                format!("Target diagnostics failed: {}", failed.join("; ")),
            ));
        }
        Ok(json!({ "diagnostics": diagnostics.len() }))
    }
}

struct DecommissionSource;

#[async_trait]
impl StepHandler<MigrationContext> for DecommissionSource {
    async fn run(&self, ctx: &MigrationContext) -> Result<Value> {
        ctx.registry.stop_provider(&ctx.source).await?;
        ctx.registry.unregister_provider(&ctx.source).await?;
        Ok(json!({ "decommissioned": ctx.source }))
    }
}

/// Drives provider migrations against a registry
pub struct MigrationManager {
    registry: Arc<dyn ProviderRegistry>,
    executor: StepExecutor<MigrationContext>,
    store: RunStore<MigrationProgress>,
    in_flight: DashMap<String, String>,
    events: EventBus,
}

impl MigrationManager {
    pub fn new(registry: Arc<dyn ProviderRegistry>, events: EventBus, config: &PipelineConfig) -> Self {
        let executor = StepExecutor::new(config.step_timeout(), events.clone())
            .with_handler(VALIDATE_SOURCE, Arc::new(ValidateSource))
            .with_handler(VALIDATE_TARGET, Arc::new(ValidateTarget))
            .with_handler(BACKUP_SOURCE, Arc::new(BackupSource))
            .with_handler(EXPORT_CONFIGURATION, Arc::new(ExportConfiguration))
            .with_handler(REGISTER_TARGET, Arc::new(RegisterTarget))
            .with_handler(START_TARGET, Arc::new(StartTarget))
            .with_handler(VERIFY_TARGET, Arc::new(VerifyTarget))
            .with_handler(DECOMMISSION_SOURCE, Arc::new(DecommissionSource));
        Self {
            registry,
            executor,
            store: RunStore::new(config.history_limit),
            in_flight: DashMap::new(),
            events,
        }
    }

    /// Replace the handler of a migration step
    pub fn with_step_handler(
        mut self,
        step_id: impl Into<String>,
        handler: Arc<dyn StepHandler<MigrationContext>>,
    ) -> Self {
        self.executor.register(step_id, handler);
        self
    }

    /// Migrate a provider onto a new provider of `target_type`
    pub async fn migrate_provider(
        &self,
        source: &str,
        target_type: &str,
        wizard: &WizardData,
        options: &MigrationOptions,
    ) -> MigrationProgress {
        let now = Utc::now();
        let migration_id = run_id("migration", now);
        let target = provider_name(wizard, target_type, now);
        let run = shared(MigrationProgress::new(&migration_id, source, &target, target_type));

        match self.in_flight.entry(target.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!(migration_id = %migration_id, target = %target, "Rejecting migration, target already in use");
                {
                    let mut progress = run.write();
                    progress.status = RunStatus::Failed;
                    progress.errors.push(SetupError::ProviderBusy(target.clone()).to_string());
                    progress.completed_at = Some(Utc::now());
                }
                self.store.push_history(run.read().clone());
                self.publish_completed(&run);
                let snapshot = run.read().clone();
                return snapshot;
            }
            Entry::Vacant(slot) => {
                slot.insert(migration_id.clone());
            }
        }

        let ctx = Arc::new(MigrationContext::new(
            self.registry.clone(),
            source,
            &target,
            target_type,
            wizard.clone(),
        ));
        {
            let mut progress = run.write();
            progress.set_steps(migration_steps(target_type, options));
            progress.status = RunStatus::InProgress;
        }
        self.store.insert_active(&migration_id, run.clone());

        tracing::info!(
            migration_id = %migration_id,
            source = %source,
            target = %target,
            target_type = %target_type,
            "Starting provider migration"
        );
        self.events.publish(PipelineEvent::MigrationStarted {
            migration_id: migration_id.clone(),
            source_provider: source.to_string(),
            target_provider: target.clone(),
            at: now,
        });

        let outcome = if options.validate_only {
            let result = self.validate_migration(source, target_type, wizard).await;
            run.write().warnings.extend(result.warnings.iter().cloned());
            if result.valid {
                Ok(())
            } else {
                Err(SetupError::configuration(result.errors.join("; ")))
            }
        } else {
            let policy = ExecutionPolicy {
                continue_on_warnings: options.continue_on_warnings,
            };
            self.executor.execute(&run, ctx.as_ref(), policy).await
        };

        let roll_back_run = {
            let mut progress = run.write();
            match outcome {
                _ if progress.status == RunStatus::Cancelled => {
                    tracing::info!(migration_id = %migration_id, "Provider migration cancelled");
                    true
                }
                Ok(()) => {
                    progress.status = RunStatus::Completed;
                    false
                }
                Err(err) => {
                    progress.status = RunStatus::Failed;
                    if !err.is_recorded_by_step() {
                        progress.errors.push(err.to_string());
                    }
                    tracing::error!(migration_id = %migration_id, error = %err, "Provider migration failed");
                    options.rollback_on_failure
                }
            }
        };

        if roll_back_run {
            let report = roll_back(
                self.registry.as_ref(),
                &migration_id,
                &ctx.rollback_plan(),
                &self.events,
            )
            .await;
            run.write().rollback = Some(report);
        }

        self.finish(&migration_id, &target, &run);
        let snapshot = run.read().clone();
        snapshot
    }

    fn finish(&self, migration_id: &str, target: &str, run: &Shared<MigrationProgress>) {
        {
            let mut progress = run.write();
            progress.current_step = None;
            if progress.completed_at.is_none() {
                progress.completed_at = Some(Utc::now());
            }
        }
        self.in_flight
            .remove_if(target, |_, active_id| active_id.as_str() == migration_id);

        if self.store.finalize(migration_id) {
            if run.read().status == RunStatus::Cancelled {
                self.events.publish(PipelineEvent::MigrationCancelled {
                    migration_id: migration_id.to_string(),
                });
            }
            tracing::info!(
                migration_id = %migration_id,
                status = %run.read().status,
                "Provider migration finished"
            );
            self.publish_completed(run);
        }
    }

    fn publish_completed(&self, run: &Shared<MigrationProgress>) {
        let progress = run.read();
        self.events.publish(PipelineEvent::MigrationCompleted {
            migration_id: progress.migration_id.clone(),
            target_provider: progress.target_provider.clone(),
            status: progress.status,
            duration_ms: progress.duration_ms().unwrap_or(0),
        });
    }

    /// Check that a migration could run, without executing anything
    pub async fn validate_migration(
        &self,
        source: &str,
        target_type: &str,
        wizard: &WizardData,
    ) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.registry.get_provider_info(source).is_none() {
            result = result.with_error(format!("Source provider '{}' is not registered", source));
        }

        let target = provider_name(wizard, target_type, Utc::now());
        if self.registry.has_provider(&target) {
            result = result.with_error(format!("Target provider '{}' already exists", target));
        }

        result.merge(validate_wizard_data(self.registry.as_ref(), target_type, wizard).await);
        result
    }

    pub fn get_migration_progress(&self, migration_id: &str) -> Option<MigrationProgress> {
        self.store.snapshot_active(migration_id)
    }

    pub fn get_active_migrations(&self) -> Vec<MigrationProgress> {
        self.store.active_snapshots()
    }

    pub fn get_migration_history(&self) -> Vec<MigrationProgress> {
        self.store.history()
    }

    pub fn recent_migration_history(&self, n: usize) -> Vec<MigrationProgress> {
        self.store.recent_history(n)
    }

    /// Request cancellation of an active migration
    ///
    /// The step in progress finishes first; the run then rolls back and is
    /// recorded in history by its own task.
    pub fn cancel_migration(&self, migration_id: &str) -> bool {
        let Some(run) = self.store.get_active(migration_id) else {
            return false;
        };
        let mut progress = run.write();
        if progress.status.is_terminal() {
            return false;
        }
        progress.status = RunStatus::Cancelled;
        tracing::info!(migration_id = %migration_id, "Cancelling provider migration");
        true
    }
}
