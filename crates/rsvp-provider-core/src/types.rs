//! Provider data model
//!
//! Configuration, wizard input and the health/diagnostic payloads exchanged
//! with the Provider Registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Free-form provider configuration map
pub type ConfigMap = serde_json::Map<String, Value>;

/// Wizard answers keyed by wizard step id
pub type WizardData = BTreeMap<String, Value>;

/// Look up a dotted path (`connection.name`) in wizard data
pub fn wizard_value<'a>(data: &'a WizardData, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = data.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Broad family a provider belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Database,
    Auth,
    Email,
    Storage,
    Other,
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCategory::Database => write!(f, "database"),
            ProviderCategory::Auth => write!(f, "auth"),
            ProviderCategory::Email => write!(f, "email"),
            ProviderCategory::Storage => write!(f, "storage"),
            ProviderCategory::Other => write!(f, "other"),
        }
    }
}

/// Complete configuration for one provider instance
///
/// Built once per setup run from wizard answers merged into the type
/// defaults. Treated as immutable once step execution starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
    pub id: String,
    pub name: String,
    pub provider_type: String,
    pub version: String,
    pub category: ProviderCategory,
    pub description: String,
    /// Capabilities the provider claims to offer
    pub features: Vec<String>,
    /// Platforms or versions this provider is known to work with
    pub compatibility: Vec<String>,
    pub config: ConfigMap,
    pub secrets: BTreeMap<String, String>,
    pub enabled: bool,
    pub auto_start: bool,
    pub health_check: bool,
    pub priority: u32,
    pub timeout_ms: u64,
    pub retries: u32,
}

impl ProviderConfiguration {
    /// Look up a dotted path in the configuration map
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.config.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// String value at a dotted path
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// Unsigned integer value at a dotted path; numeric strings are accepted
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        match self.lookup(path)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value at a dotted path; "true"/"false" strings are accepted
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.lookup(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether a non-empty value exists either in config or in secrets
    pub fn has_field(&self, path: &str) -> bool {
        let in_config = match self.lookup(path) {
            Some(Value::Null) | None => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        in_config
            || self
                .secrets
                .get(path)
                .map(|s| !s.is_empty())
                .unwrap_or(false)
    }
}

/// Field definition inside a wizard step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardField {
    pub name: String,
    pub required: bool,
    #[serde(default)]
    pub secret: bool,
}

impl WizardField {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            secret: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            secret: false,
        }
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// One page of the provider setup wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardStep {
    pub id: String,
    pub title: String,
    pub required: bool,
    pub fields: Vec<WizardField>,
}

/// Outcome of a validation check: valid flag plus collected messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// A passing result with no messages
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Build a result from messages; valid iff there are no errors
    pub fn from_messages(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.valid = false;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }
}

/// Coarse health of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Lifecycle status of a registered provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Registered,
    Running,
    Stopped,
    Error,
}

/// Result of the registry's health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealthCheck {
    pub health: HealthState,
    pub status: ProviderStatus,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Live performance figures reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub response_time_ms: f64,
    /// Fraction of failed operations (0.0 - 1.0)
    pub error_rate: f64,
    pub throughput_per_sec: Option<f64>,
}

/// Detailed health as reported by the provider itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedHealth {
    pub health: HealthState,
    pub performance: PerformanceSnapshot,
    #[serde(default)]
    pub details: ConfigMap,
}

/// Result of one diagnostic test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub success: bool,
    pub message: String,
}

impl DiagnosticResult {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Diagnostic results keyed by test name
pub type Diagnostics = BTreeMap<String, DiagnosticResult>;

/// Names of the diagnostic tests that did not succeed
pub fn failed_diagnostics(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|(_, result)| !result.success)
        .map(|(name, result)| format!("{}: {}", name, result.message))
        .collect()
}

/// Listing entry for a registered provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub name: String,
    pub provider_type: String,
    pub category: ProviderCategory,
    pub status: ProviderStatus,
    pub enabled: bool,
}

/// Action performed by one declared setup-automation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum AutomationAction {
    CreateSchema,
    ValidateConfiguration,
    RunMigrations,
    Custom(String),
}

/// A step declared by a provider's setup automation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationStep {
    pub id: String,
    pub name: String,
    pub action: AutomationAction,
}

impl AutomationStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, action: AutomationAction) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            action,
        }
    }
}
