//! Provider type catalog
//!
//! Per-type defaults used when building a configuration from wizard input,
//! the fields each type requires, and setup-time budgets.

use serde_json::{json, Value};

use crate::types::{ConfigMap, ProviderCategory, ProviderConfiguration, WizardData};

/// Wizard step whose payload carries operability flags instead of config
pub const SETTINGS_STEP: &str = "settings";

/// Key inside a wizard payload holding explicit secrets
pub const SECRETS_KEY: &str = "secrets";

/// Static description of a provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub provider_type: &'static str,
    pub category: ProviderCategory,
    pub version: &'static str,
    pub default_port: Option<u16>,
    /// Fields that must be present in config or secrets
    pub required_fields: &'static [&'static str],
    pub features: &'static [&'static str],
    /// Base estimate for a full setup run, before per-wizard-step time
    pub base_setup_secs: u64,
    /// Budget for the setup-automation step
    pub automation_secs: u64,
}

const GENERIC: ProviderDefaults = ProviderDefaults {
    provider_type: "generic",
    category: ProviderCategory::Other,
    version: "1.0.0",
    default_port: None,
    required_fields: &[],
    features: &[],
    base_setup_secs: 120,
    automation_secs: 30,
};

/// Defaults for a provider type; unknown types get generic defaults
pub fn defaults_for(provider_type: &str) -> ProviderDefaults {
    match provider_type.to_ascii_lowercase().as_str() {
        "postgresql" | "postgres" => ProviderDefaults {
            provider_type: "postgresql",
            category: ProviderCategory::Database,
            version: "15.0.0",
            default_port: Some(5432),
            required_fields: &["host", "database", "username", "password"],
            features: &["transactions", "schema_migrations", "backup"],
            base_setup_secs: 300,
            automation_secs: 120,
        },
        "mysql" => ProviderDefaults {
            provider_type: "mysql",
            category: ProviderCategory::Database,
            version: "8.0.0",
            default_port: Some(3306),
            required_fields: &["host", "database", "username", "password"],
            features: &["transactions", "schema_migrations", "backup"],
            base_setup_secs: 300,
            automation_secs: 120,
        },
        "mongodb" => ProviderDefaults {
            provider_type: "mongodb",
            category: ProviderCategory::Database,
            version: "7.0.0",
            default_port: Some(27017),
            required_fields: &["host", "database"],
            features: &["documents", "backup"],
            base_setup_secs: 240,
            automation_secs: 90,
        },
        "supabase" => ProviderDefaults {
            provider_type: "supabase",
            category: ProviderCategory::Database,
            version: "2.0.0",
            default_port: Some(443),
            required_fields: &["url", "anonKey"],
            features: &["realtime", "row_level_security", "schema_migrations"],
            base_setup_secs: 240,
            automation_secs: 120,
        },
        "firebase" => ProviderDefaults {
            provider_type: "firebase",
            category: ProviderCategory::Database,
            version: "10.0.0",
            default_port: Some(443),
            required_fields: &["projectId", "apiKey"],
            features: &["realtime", "documents"],
            base_setup_secs: 180,
            automation_secs: 60,
        },
        "sqlite" => ProviderDefaults {
            provider_type: "sqlite",
            category: ProviderCategory::Database,
            version: "3.45.0",
            default_port: None,
            required_fields: &["path"],
            features: &["transactions", "schema_migrations"],
            base_setup_secs: 60,
            automation_secs: 60,
        },
        "auth0" => ProviderDefaults {
            provider_type: "auth0",
            category: ProviderCategory::Auth,
            version: "4.0.0",
            default_port: Some(443),
            required_fields: &["domain", "clientId", "clientSecret"],
            features: &["oauth", "mfa", "social_login"],
            base_setup_secs: 180,
            automation_secs: 30,
        },
        "sendgrid" => ProviderDefaults {
            provider_type: "sendgrid",
            category: ProviderCategory::Email,
            version: "7.0.0",
            default_port: Some(443),
            required_fields: &["apiKey", "fromAddress"],
            features: &["templates", "tracking"],
            base_setup_secs: 120,
            automation_secs: 30,
        },
        "smtp" => ProviderDefaults {
            provider_type: "smtp",
            category: ProviderCategory::Email,
            version: "1.0.0",
            default_port: Some(587),
            required_fields: &["host", "username", "password", "fromAddress"],
            features: &["tls"],
            base_setup_secs: 120,
            automation_secs: 30,
        },
        "s3" => ProviderDefaults {
            provider_type: "s3",
            category: ProviderCategory::Storage,
            version: "3.0.0",
            default_port: Some(443),
            required_fields: &["bucket", "region", "accessKeyId", "secretAccessKey"],
            features: &["presigned_urls", "versioning"],
            base_setup_secs: 150,
            automation_secs: 30,
        },
        "local-storage" | "local" => ProviderDefaults {
            provider_type: "local-storage",
            category: ProviderCategory::Storage,
            version: "1.0.0",
            default_port: None,
            required_fields: &["path"],
            features: &[],
            base_setup_secs: 60,
            automation_secs: 15,
        },
        _ => GENERIC,
    }
}

/// Type-specific default config map
pub fn default_config(provider_type: &str) -> ConfigMap {
    let defaults = defaults_for(provider_type);
    let value = match defaults.category {
        ProviderCategory::Database if defaults.default_port.is_some() => json!({
            "port": defaults.default_port,
            "ssl": true,
            "maxConnections": 20,
            "connectionTimeoutMs": 10000,
        }),
        ProviderCategory::Database => json!({
            "journalMode": "wal",
        }),
        ProviderCategory::Email => json!({
            "port": defaults.default_port,
            "tls": true,
            "maxSendRate": 10,
        }),
        ProviderCategory::Storage => json!({
            "maxUploadMb": 25,
        }),
        ProviderCategory::Auth => json!({
            "ssl": true,
            "sessionTtlSecs": 86400,
        }),
        ProviderCategory::Other => json!({}),
    };
    value.as_object().cloned().unwrap_or_default()
}

/// Fresh configuration for a type with defaults applied
pub fn base_configuration(provider_type: &str, name: &str) -> ProviderConfiguration {
    let defaults = defaults_for(provider_type);
    ProviderConfiguration {
        id: format!("{}-{}", provider_type, uuid::Uuid::new_v4()),
        name: name.to_string(),
        provider_type: provider_type.to_string(),
        version: defaults.version.to_string(),
        category: defaults.category,
        description: format!("{} provider", provider_type),
        features: defaults.features.iter().map(|f| f.to_string()).collect(),
        compatibility: Vec::new(),
        config: default_config(provider_type),
        secrets: Default::default(),
        enabled: true,
        auto_start: true,
        health_check: true,
        priority: 100,
        timeout_ms: 30_000,
        retries: 3,
    }
}

/// Whether a config key looks like it holds a credential
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    [
        "password",
        "secret",
        "token",
        "apikey",
        "privatekey",
        "accesskey",
        "anonkey",
        "credentials",
    ]
    .iter()
    .any(|needle| normalized.contains(needle))
}

/// Merge wizard answers into the type defaults
///
/// String values under credential-like keys and everything under a
/// `secrets` object go to the secrets map. The `settings` step carries
/// operability flags.
pub fn build_configuration(
    provider_type: &str,
    name: &str,
    wizard: &WizardData,
) -> ProviderConfiguration {
    let mut config = base_configuration(provider_type, name);
    apply_wizard_data(&mut config, wizard);
    config
}

/// Overlay wizard answers onto an existing configuration
pub fn apply_wizard_data(config: &mut ProviderConfiguration, wizard: &WizardData) {
    for (step_id, payload) in wizard {
        let Some(fields) = payload.as_object() else {
            continue;
        };

        if step_id == SETTINGS_STEP {
            apply_settings(config, fields);
            continue;
        }

        for (key, value) in fields {
            if key == SECRETS_KEY {
                if let Some(secrets) = value.as_object() {
                    for (secret_key, secret) in secrets {
                        if let Some(secret) = secret.as_str() {
                            config.secrets.insert(secret_key.clone(), secret.to_string());
                        }
                    }
                }
                continue;
            }

            if is_sensitive_key(key) {
                if let Value::String(secret) = value {
                    config.secrets.insert(key.clone(), secret.clone());
                    continue;
                }
            }

            config.config.insert(key.clone(), value.clone());
        }
    }
}

fn apply_settings(config: &mut ProviderConfiguration, settings: &ConfigMap) {
    if let Some(enabled) = settings.get("enabled").and_then(Value::as_bool) {
        config.enabled = enabled;
    }
    if let Some(auto_start) = settings.get("autoStart").and_then(Value::as_bool) {
        config.auto_start = auto_start;
    }
    if let Some(health_check) = settings.get("healthCheck").and_then(Value::as_bool) {
        config.health_check = health_check;
    }
    if let Some(priority) = settings.get("priority").and_then(Value::as_u64) {
        config.priority = priority.min(u32::MAX as u64) as u32;
    }
    if let Some(timeout) = settings.get("timeout").and_then(Value::as_u64) {
        config.timeout_ms = timeout;
    }
    if let Some(retries) = settings.get("retries").and_then(Value::as_u64) {
        config.retries = retries.min(u32::MAX as u64) as u32;
    }
    if let Some(description) = settings.get("description").and_then(Value::as_str) {
        config.description = description.to_string();
    }
    if let Some(features) = settings.get("features").and_then(Value::as_array) {
        config.features = features
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_uses_generic_defaults() {
        let defaults = defaults_for("carrier-pigeon");
        assert_eq!(defaults.category, ProviderCategory::Other);
        assert!(defaults.required_fields.is_empty());
    }

    #[test]
    fn test_type_lookup_is_case_insensitive() {
        assert_eq!(defaults_for("PostgreSQL").provider_type, "postgresql");
        assert_eq!(defaults_for("postgres").default_port, Some(5432));
    }

    #[test]
    fn test_sensitive_key_detection() {
        assert!(is_sensitive_key("password"));
        assert!(is_sensitive_key("api_key"));
        assert!(is_sensitive_key("clientSecret"));
        assert!(is_sensitive_key("secretAccessKey"));
        assert!(!is_sensitive_key("host"));
        assert!(!is_sensitive_key("username"));
    }

    #[test]
    fn test_build_configuration_routes_secrets() {
        let mut wizard = WizardData::new();
        wizard.insert(
            "connection".into(),
            json!({"host": "db.example.com", "password": "s3cret", "database": "rsvp"}),
        );
        wizard.insert("credentials".into(), json!({"secrets": {"sslCert": "PEM"}}));

        let config = build_configuration("postgresql", "wedding-db", &wizard);

        assert_eq!(config.get_str("host"), Some("db.example.com"));
        assert!(config.lookup("password").is_none());
        assert_eq!(config.secrets.get("password").map(String::as_str), Some("s3cret"));
        assert_eq!(config.secrets.get("sslCert").map(String::as_str), Some("PEM"));
        // Defaults survive the merge
        assert_eq!(config.get_u64("port"), Some(5432));
    }

    #[test]
    fn test_build_configuration_applies_settings() {
        let mut wizard = WizardData::new();
        wizard.insert(
            SETTINGS_STEP.into(),
            json!({"autoStart": false, "priority": 5, "timeout": 1000, "retries": 1}),
        );

        let config = build_configuration("sendgrid", "mailer", &wizard);

        assert!(!config.auto_start);
        assert_eq!(config.priority, 5);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.retries, 1);
        assert!(config.lookup("autoStart").is_none());
    }
}
