//! Integration tests for the provider core

use rsvp_provider_core::defaults::build_configuration;
use rsvp_provider_core::*;
use serde_json::json;
use std::sync::Arc;

fn wizard(entries: serde_json::Value) -> WizardData {
    entries
        .as_object()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .collect()
}

#[tokio::test]
async fn test_wizard_answers_flow_into_registered_provider() {
    let registry = SandboxRegistry::new();
    let data = wizard(json!({
        "connection": {
            "name": "guests-db",
            "host": "db.internal",
            "database": "rsvp",
            "username": "rsvp",
            "password": "hunter22hunter22"
        },
        "settings": {"autoStart": false, "priority": 5}
    }));

    let config = build_configuration("postgresql", "guests-db", &data);
    assert_eq!(config.secrets.get("password").map(String::as_str), Some("hunter22hunter22"));
    assert!(!config.auto_start);

    registry
        .register_provider("guests-db", "postgresql", &config)
        .await
        .unwrap();
    let info = registry.get_provider_info("guests-db").unwrap();
    assert_eq!(info.priority, 5);
    assert_eq!(info.get_str("host"), Some("db.internal"));
    assert_eq!(registry.provider_status("guests-db"), Some(ProviderStatus::Registered));
}

#[tokio::test]
async fn test_automation_is_exposed_through_handle() {
    let registry = SandboxRegistry::new();
    let automation = Arc::new(SandboxAutomation::standard());
    registry.set_template("supabase", SandboxProvider::new().with_automation(automation.clone()));

    let config = build_configuration("supabase", "realtime", &WizardData::new());
    registry.register_provider("realtime", "supabase", &config).await.unwrap();

    let handle = registry.get_provider("realtime").unwrap();
    let exposed = handle.setup_automation().unwrap();
    assert_eq!(exposed.setup_steps().len(), 3);
    exposed.create_schema().await.unwrap();
    assert_eq!(automation.schema_calls(), 1);
}

#[tokio::test]
async fn test_event_bus_feeds_metrics() {
    let metrics = Arc::new(PipelineMetrics::new().unwrap());
    let bus = EventBus::default().with_metrics(metrics.clone());
    let mut rx = bus.subscribe();

    bus.publish(PipelineEvent::MigrationCompleted {
        migration_id: "migration-1".into(),
        target_provider: "new-db".into(),
        status: RunStatus::Completed,
        duration_ms: 10,
    });

    assert_eq!(rx.recv().await.unwrap().name(), "migration_completed");
    assert!(metrics
        .gather_text()
        .unwrap()
        .contains("provider_setup_migration_runs_total"));
}

#[tokio::test]
async fn test_static_probe_reports_endpoint() {
    let config = build_configuration(
        "smtp",
        "mailer",
        &wizard(json!({"connection": {"host": "smtp.example.com"}})),
    );

    let sample = StaticProbe::reachable(12).probe(&config).await.unwrap();
    assert_eq!(sample.address.as_deref(), Some("smtp.example.com:587"));
    assert_eq!(sample.latency_ms, 12);

    let err = StaticProbe::unreachable("no route").probe(&config).await.unwrap_err();
    assert!(matches!(err, RegistryError::Unavailable(_)));
}
