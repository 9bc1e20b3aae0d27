//! Integration tests for the provider validator

use rsvp_provider_core::{
    build_configuration, DiagnosticResult, EventBus, HealthState, PipelineConfig,
    PipelineMetrics, ProviderStatus, SandboxAutomation, SandboxProvider, SandboxRegistry,
    ValidationResult, WizardData,
};
use rsvp_provider_validation::*;
use serde_json::json;
use std::sync::Arc;

fn compliant_wizard() -> WizardData {
    let mut wizard = WizardData::new();
    wizard.insert(
        "connection".into(),
        json!({
            "host": "db.internal",
            "database": "rsvp",
            "username": "app",
            "password": "Sup3rSecretPass",
            "dataRetentionDays": 730,
            "auditLogging": true
        }),
    );
    wizard
}

fn seeded(template: SandboxProvider, wizard: &WizardData) -> Arc<SandboxRegistry> {
    let registry = Arc::new(SandboxRegistry::new());
    registry.set_template("postgresql", template);
    registry.seed_provider(
        build_configuration("postgresql", "guests-db", wizard),
        ProviderStatus::Running,
    );
    registry
}

fn healthy_postgres() -> SandboxProvider {
    SandboxProvider::new().with_automation(Arc::new(SandboxAutomation::standard()))
}

fn rule(id: &str, category: RuleCategory, severity: Severity, result: ValidationResult) -> SharedRule {
    Arc::new(FnRule::new(
        RuleDescriptor::new(id, id, category, severity),
        move |_, _| Ok(result.clone()),
    ))
}

#[tokio::test]
async fn test_builtin_catalog_passes_a_healthy_provider() {
    let registry = seeded(healthy_postgres(), &compliant_wizard());
    let validator = ProviderValidator::new(registry, EventBus::default(), &PipelineConfig::default());

    let report = validator
        .validate_provider("guests-db", &ValidationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total_rules, 8);
    assert_eq!(report.passed_rules, 8, "unexpected findings: {:?}", report.results);
    assert_eq!(report.overall_result, OverallResult::Passed);
    assert_eq!(report.compliance_score, 100);
    assert_eq!(report.security_score, 60);
    assert_eq!(report.performance_score, 100);
    assert_eq!(report.provider_type, "postgresql");
}

#[tokio::test]
async fn test_zero_compliance_rules_scores_full_compliance() {
    let registry = seeded(healthy_postgres(), &WizardData::new());
    let validator = ProviderValidator::empty(registry, EventBus::default(), &PipelineConfig::default());
    validator.add_validation_rule(rule(
        "only-config",
        RuleCategory::Configuration,
        Severity::Error,
        ValidationResult::ok().with_error("missing host"),
    ));

    let report = validator
        .validate_provider("guests-db", &ValidationOptions::default())
        .await
        .unwrap();
    assert_eq!(report.compliance_score, 100);
    assert_eq!(report.overall_result, OverallResult::Failed);
}

#[tokio::test]
async fn test_security_score_adds_rule_points() {
    let registry = seeded(healthy_postgres(), &WizardData::new());
    let validator = ProviderValidator::empty(registry, EventBus::default(), &PipelineConfig::default());
    validator.add_validation_rule(rule(
        "strict",
        RuleCategory::Security,
        Severity::Error,
        ValidationResult::ok(),
    ));
    validator.add_validation_rule(rule(
        "advisory",
        RuleCategory::Security,
        Severity::Warning,
        ValidationResult::ok().with_warning("Consider rotating keys"),
    ));

    let report = validator
        .validate_provider("guests-db", &ValidationOptions::default())
        .await
        .unwrap();
    assert_eq!(report.security_score, 50);
    assert_eq!(report.overall_result, OverallResult::Warning);
}

#[tokio::test]
async fn test_insecure_and_unhealthy_provider_fails() {
    let template = SandboxProvider::new()
        .with_performance(1_800.0, 0.01)
        .with_health(HealthState::Degraded)
        .with_diagnostic("query", DiagnosticResult::failed("permission denied"));
    let mut wizard = WizardData::new();
    wizard.insert(
        "connection".into(),
        json!({"host": "db", "database": "rsvp", "ssl": false, "password": "pw"}),
    );
    let registry = seeded(template, &wizard);
    let validator = ProviderValidator::new(registry, EventBus::default(), &PipelineConfig::default());

    let report = validator
        .validate_provider("guests-db", &ValidationOptions::default().continue_on_error())
        .await
        .unwrap();

    assert_eq!(report.overall_result, OverallResult::Failed);
    let status = |id: &str| {
        report
            .results
            .iter()
            .find(|r| r.rule.id == id)
            .map(|r| r.status)
    };
    assert_eq!(status("security-config-validation"), Some(RuleStatus::Warning));
    assert_eq!(status("config-completeness"), Some(RuleStatus::Failed));
    assert_eq!(status("performance-health-check"), Some(RuleStatus::Warning));
    assert_eq!(status("connectivity-test"), Some(RuleStatus::Failed));
    assert_eq!(report.performance_score, 50);

    let text = report.recommendations.join("\n");
    assert!(text.contains("Enable SSL/TLS"));
    assert!(text.contains("Complete all required configuration fields"));
    assert!(report.errors().iter().any(|e| e.starts_with("connectivity-test:")));
}

#[tokio::test]
async fn test_diagnostics_error_stops_report_without_continue() {
    let template = healthy_postgres().with_diagnostics_error("connection reset");
    let registry = seeded(template, &compliant_wizard());
    let validator = ProviderValidator::new(registry, EventBus::default(), &PipelineConfig::default());

    let report = validator
        .validate_provider("guests-db", &ValidationOptions::default())
        .await
        .unwrap();

    let last = report.results.last().unwrap();
    assert_eq!(last.rule.id, "connectivity-test");
    assert_eq!(last.status, RuleStatus::Failed);
    assert!(last.error.as_deref().unwrap_or_default().contains("connection reset"));
    assert_eq!(report.total_rules, 6);
    assert_eq!(report.overall_result, OverallResult::Failed);
}

#[tokio::test]
async fn test_missing_provider_is_not_recorded() {
    let validator = ProviderValidator::new(
        Arc::new(SandboxRegistry::new()),
        EventBus::default(),
        &PipelineConfig::default(),
    );
    let err = validator
        .validate_provider("nobody", &ValidationOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_lookup_failure());
    assert!(validator.get_validation_history().is_empty());
}

#[tokio::test]
async fn test_history_is_bounded() {
    let registry = seeded(healthy_postgres(), &compliant_wizard());
    let config = PipelineConfig {
        history_limit: 3,
        ..PipelineConfig::default()
    };
    let validator = ProviderValidator::empty(registry, EventBus::default(), &config);

    let mut last_id = String::new();
    for _ in 0..5 {
        last_id = validator
            .validate_provider("guests-db", &ValidationOptions::default())
            .await
            .unwrap()
            .report_id;
    }
    let history = validator.get_validation_history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].report_id, last_id);
}

#[tokio::test]
async fn test_scores_reach_metrics_through_the_bus() {
    let metrics = Arc::new(PipelineMetrics::new().unwrap());
    let events = EventBus::default().with_metrics(Arc::clone(&metrics));
    let registry = seeded(healthy_postgres(), &compliant_wizard());
    let validator = ProviderValidator::new(registry, events, &PipelineConfig::default());

    validator
        .validate_provider("guests-db", &ValidationOptions::default())
        .await
        .unwrap();

    let text = metrics.gather_text().unwrap();
    assert!(text.contains("guests-db"));
    assert!(text.contains("passed"));
}
