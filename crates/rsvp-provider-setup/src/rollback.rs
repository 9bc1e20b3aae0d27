//! Best-effort rollback
//!
//! Every action is attempted independently: a failure is logged, recorded in
//! the report and never stops the remaining actions. Rollback never returns
//! an error to the caller.

use rsvp_provider_core::{
    EventBus, PipelineEvent, ProviderRegistry, RollbackAction, RollbackOutcome, RollbackReport,
};

/// What a rollback should undo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackPlan {
    /// Provider created by the run, to stop and unregister
    pub created_provider: Option<String>,
    /// Provider to restore from a backup taken by the run
    pub restore: Option<(String, String)>,
}

impl RollbackPlan {
    pub fn remove(mut self, provider: impl Into<String>) -> Self {
        self.created_provider = Some(provider.into());
        self
    }

    pub fn restore(mut self, provider: impl Into<String>, backup_id: impl Into<String>) -> Self {
        self.restore = Some((provider.into(), backup_id.into()));
        self
    }
}

/// Execute a rollback plan and publish the resulting report
pub async fn roll_back(
    registry: &dyn ProviderRegistry,
    run_id: &str,
    plan: &RollbackPlan,
    events: &EventBus,
) -> RollbackReport {
    let mut report = RollbackReport::default();

    match plan.created_provider.as_deref() {
        Some(name) if registry.has_provider(name) => {
            let stopped = registry.stop_provider(name).await;
            report.record(RollbackAction::StopProvider, name, outcome(run_id, "stop", name, stopped));

            let unregistered = registry.unregister_provider(name).await;
            report.record(
                RollbackAction::UnregisterProvider,
                name,
                outcome(run_id, "unregister", name, unregistered),
            );
        }
        Some(name) => {
            let reason = RollbackOutcome::Skipped("provider not registered".into());
            report.record(RollbackAction::StopProvider, name, reason.clone());
            report.record(RollbackAction::UnregisterProvider, name, reason);
        }
        None => {
            let reason = RollbackOutcome::Skipped("run did not register a provider".into());
            report.record(RollbackAction::StopProvider, "", reason.clone());
            report.record(RollbackAction::UnregisterProvider, "", reason);
        }
    }

    match &plan.restore {
        Some((name, backup_id)) => {
            let restored = registry.restore_provider(name, backup_id).await;
            report.record(
                RollbackAction::RestoreBackup,
                name,
                outcome(run_id, "restore", name, restored),
            );
        }
        None => report.record(
            RollbackAction::RestoreBackup,
            "",
            RollbackOutcome::Skipped("no backup taken".into()),
        ),
    }

    if report.is_clean() {
        tracing::info!(run_id = %run_id, "Rollback completed");
    } else {
        tracing::warn!(run_id = %run_id, "Rollback completed with failures");
    }

    events.publish(PipelineEvent::RollbackPerformed {
        run_id: run_id.to_string(),
        report: report.clone(),
    });
    report
}

fn outcome<E: std::fmt::Display>(
    run_id: &str,
    action: &str,
    provider: &str,
    result: Result<(), E>,
) -> RollbackOutcome {
    match result {
        Ok(()) => RollbackOutcome::Succeeded,
        Err(e) => {
            tracing::warn!(run_id = %run_id, provider = %provider, action = %action, error = %e, "Rollback action failed");
            RollbackOutcome::Failed(e.to_string())
        }
    }
}
