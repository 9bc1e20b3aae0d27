//! Integration tests for provider setup runs against the sandbox registry

use async_trait::async_trait;
use rsvp_provider_core::*;
use rsvp_provider_setup::steps::{
    CREATE_BACKUP, REGISTER_PROVIDER, RUN_DIAGNOSTICS, SETUP_AUTOMATION, START_PROVIDER,
    VERIFY_FEATURES,
};
use rsvp_provider_setup::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn wizard(name: &str) -> WizardData {
    let mut wizard = WizardData::new();
    wizard.insert(
        "connection".into(),
        json!({
            "name": name,
            "host": "db.internal",
            "database": "rsvp",
            "username": "rsvp",
            "password": "s3cure-Passw0rd!"
        }),
    );
    wizard
}

fn manager_with(registry: Arc<SandboxRegistry>, config: PipelineConfig) -> AutomatedSetupManager {
    AutomatedSetupManager::with_parts(
        registry,
        Arc::new(StaticProbe::reachable(3)),
        EventBus::default(),
        config,
    )
}

fn manager(registry: Arc<SandboxRegistry>) -> AutomatedSetupManager {
    manager_with(registry, PipelineConfig::default())
}

#[tokio::test]
async fn test_postgres_setup_with_default_options() {
    let registry = Arc::new(SandboxRegistry::new());
    let manager = manager(registry.clone());

    let progress = manager
        .setup_provider("postgresql", &wizard("guests-db"), &SetupOptions::default())
        .await;

    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.total_steps, 7);
    assert_eq!(progress.completed_steps, progress.total_steps);
    assert!(progress.steps.iter().all(|s| s.id != CREATE_BACKUP));
    assert!(progress.errors.is_empty());
    assert_eq!(registry.provider_status("guests-db"), Some(ProviderStatus::Running));
}

#[tokio::test]
async fn test_skip_optional_steps_drops_verify_features() {
    let manager = manager(Arc::new(SandboxRegistry::new()));
    let options = SetupOptions {
        skip_optional_steps: true,
        ..Default::default()
    };

    let progress = manager.setup_provider("postgresql", &wizard("db"), &options).await;

    assert_eq!(progress.total_steps, 6);
    assert!(progress.steps.iter().all(|s| s.required));
    assert!(progress.steps.iter().all(|s| s.id != VERIFY_FEATURES));
    assert_eq!(progress.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_register_failure_leaves_later_steps_pending() {
    let registry = Arc::new(SandboxRegistry::new());
    registry.fail_on(SandboxOp::Register, "duplicate key");
    let manager = manager(registry.clone());

    let progress = manager
        .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
        .await;

    assert_eq!(progress.status, RunStatus::Failed);
    assert_eq!(progress.errors.len(), 1);
    assert!(progress.errors[0].contains(REGISTER_PROVIDER));
    let status_of = |id: &str| progress.steps.iter().find(|s| s.id == id).map(|s| s.status);
    assert_eq!(status_of(REGISTER_PROVIDER), Some(StepStatus::Failed));
    assert_eq!(status_of(START_PROVIDER), Some(StepStatus::Pending));
    assert!(!registry.was_called(SandboxOp::Start, "db"));
    assert_eq!(
        progress.completed_steps,
        progress
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    );
}

#[tokio::test]
async fn test_optional_failure_with_continue_on_warnings() {
    let registry = Arc::new(SandboxRegistry::new());
    registry.set_template(
        "postgresql",
        SandboxProvider::new()
            .with_capabilities(["transactions", "backup"])
            .with_failing_capability("backup"),
    );
    let manager = manager(registry);
    let options = SetupOptions {
        continue_on_warnings: true,
        ..Default::default()
    };

    let progress = manager.setup_provider("postgresql", &wizard("db"), &options).await;

    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.completed_steps, 6);
    assert!(progress.warnings.iter().any(|w| w.contains("backup")));
}

#[tokio::test]
async fn test_failed_diagnostics_roll_back_registration() {
    let registry = Arc::new(SandboxRegistry::new());
    registry.set_template(
        "postgresql",
        SandboxProvider::new().with_diagnostic("authentication", DiagnosticResult::failed("bad password")),
    );
    let manager = manager(registry.clone());
    let options = SetupOptions {
        rollback_on_failure: true,
        ..Default::default()
    };

    let progress = manager.setup_provider("postgresql", &wizard("db"), &options).await;

    assert_eq!(progress.status, RunStatus::Failed);
    assert!(progress.errors[0].contains(RUN_DIAGNOSTICS));
    let report = progress.rollback.expect("rollback report");
    assert_eq!(
        report.outcome_of(RollbackAction::StopProvider),
        Some(&RollbackOutcome::Succeeded)
    );
    assert_eq!(
        report.outcome_of(RollbackAction::UnregisterProvider),
        Some(&RollbackOutcome::Succeeded)
    );
    assert!(!registry.has_provider("db"));
}

#[tokio::test]
async fn test_rollback_failures_do_not_mask_original_error() {
    let registry = Arc::new(SandboxRegistry::new());
    registry.fail_on(SandboxOp::Start, "port in use");
    registry.fail_on(SandboxOp::Stop, "not running");
    let manager = manager(registry.clone());
    let options = SetupOptions {
        rollback_on_failure: true,
        ..Default::default()
    };

    let progress = manager.setup_provider("postgresql", &wizard("db"), &options).await;

    assert_eq!(progress.errors.len(), 1);
    assert!(progress.errors[0].contains("port in use"));
    let report = progress.rollback.unwrap();
    assert!(!report.is_clean());
    assert!(!registry.has_provider("db"));
}

#[tokio::test]
async fn test_automation_steps_run_in_declared_order() {
    let registry = Arc::new(SandboxRegistry::new());
    let automation = Arc::new(SandboxAutomation::standard());
    registry.set_template("supabase", SandboxProvider::new().with_automation(automation.clone()));
    let manager = manager(registry);

    let mut answers = WizardData::new();
    answers.insert(
        "connection".into(),
        json!({"name": "realtime", "url": "https://abc.supabase.co", "anonKey": "anon-key-value"}),
    );
    let progress = manager
        .setup_provider("supabase", &answers, &SetupOptions::default())
        .await;

    assert_eq!(progress.status, RunStatus::Completed);
    let automation_step = progress.steps.iter().find(|s| s.id == SETUP_AUTOMATION).unwrap();
    assert_eq!(
        automation_step.result,
        Some(json!({"steps": ["create-schema", "validate-config", "run-migrations"]}))
    );
    assert_eq!(automation.schema_calls(), 1);
    assert_eq!(automation.migration_calls(), 1);
}

#[tokio::test]
async fn test_history_is_bounded_and_newest_first() {
    let registry = Arc::new(SandboxRegistry::new());
    let config = PipelineConfig {
        history_limit: 100,
        ..Default::default()
    };
    let manager = manager_with(registry, config);
    let options = SetupOptions {
        validate_only: true,
        ..Default::default()
    };

    let mut last_id = String::new();
    for i in 0..105 {
        let progress = manager
            .setup_provider("postgresql", &wizard(&format!("db-{}", i)), &options)
            .await;
        last_id = progress.setup_id;
    }

    let history = manager.get_setup_history();
    assert_eq!(history.len(), 100);
    assert_eq!(history[0].setup_id, last_id);
    assert!(manager.get_active_setups().is_empty());
}

#[tokio::test]
async fn test_cancel_unknown_setup_leaves_history_unchanged() {
    let manager = manager(Arc::new(SandboxRegistry::new()));
    manager
        .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
        .await;

    assert!(!manager.cancel_setup("setup-does-not-exist"));
    assert_eq!(manager.get_setup_history().len(), 1);
}

#[tokio::test]
async fn test_completed_run_not_queryable_as_active() {
    let manager = manager(Arc::new(SandboxRegistry::new()));
    let progress = manager
        .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
        .await;

    assert!(manager.get_setup_progress(&progress.setup_id).is_none());
    assert!(manager.get_setup_progress(&progress.setup_id).is_none());
}

/// Register handler that blocks until released, used to hold a run open
struct GatedRegister {
    entered: Arc<tokio::sync::Notify>,
    release: Arc<tokio::sync::Notify>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl StepHandler<SetupContext> for GatedRegister {
    async fn run(&self, ctx: &SetupContext) -> rsvp_provider_setup::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        ctx.registry
            .register_provider(ctx.provider_name(), &ctx.config.provider_type, &ctx.config)
            .await?;
        Ok(json!({ "registered": ctx.provider_name() }))
    }
}

fn gated_manager(registry: Arc<SandboxRegistry>) -> (Arc<AutomatedSetupManager>, GatedRegister) {
    let gate = GatedRegister {
        entered: Arc::new(tokio::sync::Notify::new()),
        release: Arc::new(tokio::sync::Notify::new()),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let handle = GatedRegister {
        entered: gate.entered.clone(),
        release: gate.release.clone(),
        calls: gate.calls.clone(),
    };
    let manager = manager(registry).with_step_handler(REGISTER_PROVIDER, Arc::new(gate));
    (Arc::new(manager), handle)
}

#[tokio::test]
async fn test_cancel_rolls_back_the_step_in_flight() {
    let registry = Arc::new(SandboxRegistry::new());
    let (manager, gate) = gated_manager(registry.clone());

    let runner = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
                .await
        })
    };

    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified())
        .await
        .expect("register step entered");
    let active = manager.get_active_setups();
    assert_eq!(active.len(), 1);
    let setup_id = active[0].setup_id.clone();

    assert!(manager.cancel_setup(&setup_id));
    assert!(!manager.cancel_setup(&setup_id));
    assert!(manager.get_setup_history().is_empty());
    assert_eq!(
        manager.get_setup_progress(&setup_id).map(|p| p.status),
        Some(RunStatus::Cancelled)
    );

    gate.release.notify_one();
    let progress = runner.await.unwrap();

    assert_eq!(progress.status, RunStatus::Cancelled);
    assert_eq!(progress.completed_steps, 3);
    assert!(!registry.was_called(SandboxOp::Start, "db"));
    assert!(registry.was_called(SandboxOp::Register, "db"));
    assert!(!registry.has_provider("db"));

    let report = progress.rollback.clone().expect("cancelled run rolled back");
    assert_eq!(
        report.outcome_of(RollbackAction::UnregisterProvider),
        Some(&RollbackOutcome::Succeeded)
    );
    assert!(manager.get_setup_progress(&setup_id).is_none());
    assert!(!manager.cancel_setup(&setup_id));
}

#[tokio::test]
async fn test_cancelled_history_entry_is_final() {
    let registry = Arc::new(SandboxRegistry::new());
    let (manager, gate) = gated_manager(registry.clone());

    let runner = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
                .await
        })
    };
    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified())
        .await
        .expect("register step entered");
    let setup_id = manager.get_active_setups()[0].setup_id.clone();

    manager.cancel_setup(&setup_id);
    gate.release.notify_one();
    let progress = runner.await.unwrap();

    let recorded = manager.get_setup_history();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0], progress);
    assert!(recorded[0].completed_at.is_some());

    gate.release.notify_one();
    manager
        .setup_provider("postgresql", &wizard("other"), &SetupOptions::default())
        .await;
    assert_eq!(manager.get_setup_history()[1], progress);
}

#[tokio::test]
async fn test_same_name_concurrent_setup_is_rejected() {
    let registry = Arc::new(SandboxRegistry::new());
    let (manager, gate) = gated_manager(registry.clone());

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
                .await
        })
    };
    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified())
        .await
        .expect("register step entered");

    let second = manager
        .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
        .await;
    assert_eq!(second.status, RunStatus::Failed);
    assert!(second.errors[0].contains("already in progress"));

    gate.release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.get_setup_history().len(), 2);
}

#[tokio::test]
async fn test_events_cover_setup_lifecycle() {
    let registry = Arc::new(SandboxRegistry::new());
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let manager = AutomatedSetupManager::with_parts(
        registry,
        Arc::new(StaticProbe::reachable(1)),
        bus,
        PipelineConfig::default(),
    );

    manager
        .setup_provider("postgresql", &wizard("db"), &SetupOptions::default())
        .await;

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(names.first(), Some(&"setup_started"));
    assert_eq!(names.last(), Some(&"setup_completed"));
    assert_eq!(names.iter().filter(|n| **n == "setup_step_finished").count(), 7);
}
