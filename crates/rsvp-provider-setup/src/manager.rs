//! Automated Setup Manager
//!
//! Orchestrates one complete provider setup per call: builds the provider
//! configuration from wizard answers, executes the setup steps, finalizes
//! or rolls back, and moves the run into history exactly once.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rsvp_provider_core::defaults::{build_configuration, defaults_for};
use rsvp_provider_core::{
    shared, ConfigMap, ConnectivityProbe, EventBus, PipelineConfig, PipelineEvent,
    ProviderRegistry, RunStatus, RunStore, SetupProgress, Shared, TcpProbe, ValidationResult,
    WizardData,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, SetupError};
use crate::executor::{ExecutionPolicy, StepExecutor, StepHandler};
use crate::rollback::{roll_back, RollbackPlan};
use crate::steps::{register_setup_handlers, setup_steps, SetupContext};
use crate::wizard::{provider_name, run_id, validate_wizard_data};

/// Options for one setup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetupOptions {
    /// Include the optional create-backup step
    pub backup: bool,
    /// Drop optional steps from the step list
    pub skip_optional_steps: bool,
    /// Treat failed optional steps as warnings
    pub continue_on_warnings: bool,
    /// Validate the wizard answers without executing any step
    pub validate_only: bool,
    /// Roll back when the run fails
    pub rollback_on_failure: bool,
}

/// Drives provider setup runs against a registry
pub struct AutomatedSetupManager {
    registry: Arc<dyn ProviderRegistry>,
    probe: Arc<dyn ConnectivityProbe>,
    executor: StepExecutor<SetupContext>,
    store: RunStore<SetupProgress>,
    in_flight: DashMap<String, String>,
    events: EventBus,
    config: PipelineConfig,
}

impl AutomatedSetupManager {
    /// Manager with a TCP connectivity probe and its own event bus
    pub fn new(registry: Arc<dyn ProviderRegistry>, config: PipelineConfig) -> Self {
        let probe = Arc::new(TcpProbe::new(config.connectivity_timeout()));
        let events = EventBus::new(config.event_buffer);
        Self::with_parts(registry, probe, events, config)
    }

    pub fn with_parts(
        registry: Arc<dyn ProviderRegistry>,
        probe: Arc<dyn ConnectivityProbe>,
        events: EventBus,
        config: PipelineConfig,
    ) -> Self {
        let mut executor = StepExecutor::new(config.step_timeout(), events.clone());
        register_setup_handlers(&mut executor);
        Self {
            registry,
            probe,
            executor,
            store: RunStore::new(config.history_limit),
            in_flight: DashMap::new(),
            events,
            config,
        }
    }

    /// Replace the handler of a setup step
    pub fn with_step_handler(
        mut self,
        step_id: impl Into<String>,
        handler: Arc<dyn StepHandler<SetupContext>>,
    ) -> Self {
        self.executor.register(step_id, handler);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run a complete provider setup
    ///
    /// Expected failures are reported through the returned progress
    /// (`status == Failed` with the reason in `errors`), never as a panic or
    /// an `Err`.
    pub async fn setup_provider(
        &self,
        provider_type: &str,
        wizard: &WizardData,
        options: &SetupOptions,
    ) -> SetupProgress {
        let now = Utc::now();
        let setup_id = run_id(&format!("setup-{}", provider_type), now);
        let name = provider_name(wizard, provider_type, now);
        let run = shared(SetupProgress::new(&setup_id, &name, provider_type));

        match self.in_flight.entry(name.clone()) {
            Entry::Occupied(existing) => {
                tracing::warn!(
                    setup_id = %setup_id,
                    provider = %name,
                    active_setup = %existing.get(),
                    "Rejecting setup, provider already being set up"
                );
                drop(existing);
                {
                    let mut progress = run.write();
                    progress.status = RunStatus::Failed;
                    progress.errors.push(SetupError::ProviderBusy(name.clone()).to_string());
                    progress.completed_at = Some(Utc::now());
                }
                self.store.push_history(run.read().clone());
                self.publish_completed(&run);
                let snapshot = run.read().clone();
                return snapshot;
            }
            Entry::Vacant(slot) => {
                slot.insert(setup_id.clone());
            }
        }

        let config = build_configuration(provider_type, &name, wizard);
        let ctx = Arc::new(SetupContext::new(
            self.registry.clone(),
            self.probe.clone(),
            config,
        ));
        {
            let mut progress = run.write();
            progress.set_steps(setup_steps(provider_type, options));
            progress.status = RunStatus::InProgress;
        }
        self.store.insert_active(&setup_id, run.clone());

        tracing::info!(
            setup_id = %setup_id,
            provider = %name,
            provider_type = %provider_type,
            validate_only = options.validate_only,
            "Starting provider setup"
        );
        self.events.publish(PipelineEvent::SetupStarted {
            setup_id: setup_id.clone(),
            provider_name: name.clone(),
            provider_type: provider_type.to_string(),
            at: now,
        });

        let outcome = if options.validate_only {
            self.validate_only(provider_type, wizard, &run).await
        } else {
            let policy = ExecutionPolicy {
                continue_on_warnings: options.continue_on_warnings,
            };
            match self.executor.execute(&run, ctx.as_ref(), policy).await {
                Ok(()) => {
                    self.finalize_hook(&run, &ctx).await;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        // Checked and settled under one lock so a late cancel is never lost
        let roll_back_run = {
            let mut progress = run.write();
            match outcome {
                _ if progress.status == RunStatus::Cancelled => {
                    tracing::info!(setup_id = %setup_id, provider = %name, "Provider setup cancelled");
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
                    tracing::error!(setup_id = %setup_id, provider = %name, error = %err, "Provider setup failed");
                    options.rollback_on_failure
                }
            }
        };

        // The in-flight step has resolved, so its effects are in the plan
        if roll_back_run {
            let report = roll_back(
                self.registry.as_ref(),
                &setup_id,
                &rollback_plan(&ctx),
                &self.events,
            )
            .await;
            run.write().rollback = Some(report);
        }

        self.finish(&setup_id, &name, &run);
        let snapshot = run.read().clone();
        snapshot
    }

    async fn validate_only(
        &self,
        provider_type: &str,
        wizard: &WizardData,
        run: &Shared<SetupProgress>,
    ) -> Result<()> {
        let result = self.validate_setup(provider_type, wizard).await;
        run.write().warnings.extend(result.warnings.iter().cloned());
        if result.valid {
            Ok(())
        } else {
            Err(SetupError::configuration(result.errors.join("; ")))
        }
    }

    /// Stamp the provider description; failure is only a warning
    async fn finalize_hook(&self, run: &Shared<SetupProgress>, ctx: &SetupContext) {
        if run.read().status == RunStatus::Cancelled {
            return;
        }
        let mut partial = ConfigMap::new();
        partial.insert(
            "description".into(),
            Value::String(format!(
                "{} provider configured by automated setup at {}",
                ctx.config.provider_type,
                Utc::now().to_rfc3339()
            )),
        );
        if let Err(e) = self
            .registry
            .update_provider_config(ctx.provider_name(), partial)
            .await
        {
            tracing::warn!(provider = %ctx.provider_name(), error = %e, "Failed to finalize provider description");
            run.write()
                .warnings
                .push(format!("Failed to update provider description: {}", e));
        }
    }

    /// Move a run to history and publish completion, once
    fn finish(&self, setup_id: &str, name: &str, run: &Shared<SetupProgress>) {
        {
            let mut progress = run.write();
            progress.current_step = None;
            if progress.completed_at.is_none() {
                progress.completed_at = Some(Utc::now());
            }
        }
        self.in_flight
            .remove_if(name, |_, active_id| active_id.as_str() == setup_id);

        if self.store.finalize(setup_id) {
            let progress = run.read();
            if progress.status == RunStatus::Cancelled {
                self.events.publish(PipelineEvent::SetupCancelled {
                    setup_id: setup_id.to_string(),
                    provider_name: name.to_string(),
                });
            }
            tracing::info!(
                setup_id = %setup_id,
                provider = %name,
                status = %progress.status,
                completed_steps = progress.completed_steps,
                total_steps = progress.total_steps,
                "Provider setup finished"
            );
            drop(progress);
            self.publish_completed(run);
        }
    }

    fn publish_completed(&self, run: &Shared<SetupProgress>) {
        let progress = run.read();
        self.events.publish(PipelineEvent::SetupCompleted {
            setup_id: progress.setup_id.clone(),
            provider_name: progress.provider_name.clone(),
            provider_type: progress.provider_type.clone(),
            status: progress.status,
            duration_ms: progress.duration_ms().unwrap_or(0),
        });
    }

    /// Snapshot of an active setup; finished runs are not returned
    pub fn get_setup_progress(&self, setup_id: &str) -> Option<SetupProgress> {
        self.store.snapshot_active(setup_id)
    }

    pub fn get_active_setups(&self) -> Vec<SetupProgress> {
        self.store.active_snapshots()
    }

    /// Finished setups, newest first
    pub fn get_setup_history(&self) -> Vec<SetupProgress> {
        self.store.history()
    }

    pub fn recent_setup_history(&self, n: usize) -> Vec<SetupProgress> {
        self.store.recent_history(n)
    }

    /// Request cancellation of an active setup
    ///
    /// Returns `false` when the id is not an active, unfinished setup. A step
    /// already in progress runs to completion and no further steps start.
    /// The run then rolls back and moves into history on its own task, so
    /// the effects of the in-flight step are undone as well.
    pub fn cancel_setup(&self, setup_id: &str) -> bool {
        let Some(run) = self.store.get_active(setup_id) else {
            return false;
        };
        let mut progress = run.write();
        if progress.status.is_terminal() {
            return false;
        }
        progress.status = RunStatus::Cancelled;
        tracing::info!(setup_id = %setup_id, provider = %progress.provider_name, "Cancelling provider setup");
        true
    }

    /// Validate wizard answers without executing any setup step
    pub async fn validate_setup(&self, provider_type: &str, wizard: &WizardData) -> ValidationResult {
        validate_wizard_data(self.registry.as_ref(), provider_type, wizard).await
    }

    /// Estimated setup time in seconds
    ///
    /// Type base time plus a fixed amount per wizard step, or the configured
    /// default when the type's wizard cannot be loaded.
    pub fn get_estimated_setup_time(&self, provider_type: &str) -> u64 {
        match self.registry.get_provider_wizard_steps(provider_type) {
            Ok(steps) => {
                defaults_for(provider_type).base_setup_secs
                    + steps.len() as u64 * self.config.seconds_per_wizard_step
            }
            Err(e) => {
                tracing::debug!(provider_type = %provider_type, error = %e, "Using default setup estimate");
                self.config.default_setup_estimate_secs
            }
        }
    }
}

fn rollback_plan(ctx: &SetupContext) -> RollbackPlan {
    let mut plan = RollbackPlan::default();
    if ctx.registered() {
        plan = plan.remove(ctx.provider_name());
    }
    if let Some(backup_id) = ctx.backup_id() {
        plan = plan.restore(ctx.provider_name(), backup_id);
    }
    plan
}
