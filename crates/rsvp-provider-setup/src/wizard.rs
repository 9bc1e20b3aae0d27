//! Wizard input helpers shared by setup and migration runs

use chrono::{DateTime, Utc};
use rsvp_provider_core::{wizard_value, ProviderRegistry, ValidationResult, WizardData};
use serde_json::{Map, Value};

/// Provider name from `connection.name`, else `<type>-<millis>`
pub fn provider_name(wizard: &WizardData, provider_type: &str, at: DateTime<Utc>) -> String {
    wizard_value(wizard, "connection.name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", provider_type, at.timestamp_millis()))
}

/// Run identifier `<prefix>-<millis>-<short uuid>`
pub fn run_id(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, at.timestamp_millis(), &suffix[..8])
}

/// Validate wizard answers against the registry's wizard definition
///
/// Checks that a factory exists, then validates every required step and
/// every optional step that has answers. All errors and warnings are
/// collected; nothing is executed.
pub async fn validate_wizard_data(
    registry: &dyn ProviderRegistry,
    provider_type: &str,
    wizard: &WizardData,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if !registry.has_factory_for(provider_type) {
        result = result.with_error(format!("No provider factory found for type '{}'", provider_type));
    }

    let steps = match registry.get_provider_wizard_steps(provider_type) {
        Ok(steps) => steps,
        Err(e) => {
            return result.with_error(format!("Unable to load wizard steps: {}", e));
        }
    };

    for step in steps {
        let answers = wizard.get(&step.id);
        if answers.is_none() && !step.required {
            continue;
        }
        let data = answers.cloned().unwrap_or_else(|| Value::Object(Map::new()));
        match registry.validate_wizard_step(provider_type, &step.id, &data).await {
            Ok(step_result) => result.merge(step_result),
            Err(e) => {
                result = result.with_error(format!("Wizard step '{}' could not be validated: {}", step.id, e));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_provider_core::SandboxRegistry;
    use serde_json::json;

    #[test]
    fn test_provider_name_prefers_connection_name() {
        let mut wizard = WizardData::new();
        wizard.insert("connection".into(), json!({"name": "guests-db"}));
        assert_eq!(provider_name(&wizard, "postgresql", Utc::now()), "guests-db");
    }

    #[test]
    fn test_provider_name_falls_back_to_type_and_time() {
        let at = Utc::now();
        let name = provider_name(&WizardData::new(), "smtp", at);
        assert_eq!(name, format!("smtp-{}", at.timestamp_millis()));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let at = Utc::now();
        assert_ne!(run_id("setup-smtp", at), run_id("setup-smtp", at));
    }

    #[tokio::test]
    async fn test_missing_required_step_is_reported() {
        let registry = SandboxRegistry::new();
        let result = validate_wizard_data(&registry, "sendgrid", &WizardData::new()).await;
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("apiKey")));
    }

    #[tokio::test]
    async fn test_unknown_type_reports_missing_factory() {
        let registry = SandboxRegistry::new();
        let result = validate_wizard_data(&registry, "oracle", &WizardData::new()).await;
        assert!(result.errors[0].contains("No provider factory"));
    }
}
