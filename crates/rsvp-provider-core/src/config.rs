//! Pipeline configuration
//!
//! Tunables shared by the setup manager, migration manager, validator and
//! facade. Loaded from defaults, environment variables
//! (`PROVIDER_SETUP_*`) or a TOML/YAML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::events::DEFAULT_EVENT_BUFFER;
use crate::history::DEFAULT_HISTORY_LIMIT;

const ENV_PREFIX: &str = "PROVIDER_SETUP_";

/// Configuration for the provider setup pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cap for setup, migration and validation history
    pub history_limit: usize,
    /// Per-step handler timeout in milliseconds
    pub step_timeout_ms: u64,
    /// Reachability probe timeout in milliseconds
    pub connectivity_timeout_ms: u64,
    /// Estimate used when a type's wizard steps cannot be determined
    pub default_setup_estimate_secs: u64,
    /// Estimated seconds added per wizard step
    pub seconds_per_wizard_step: u64,
    /// History entries per list included in the system status
    pub status_history_window: usize,
    /// Broadcast channel capacity for pipeline events
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            step_timeout_ms: 300_000,
            connectivity_timeout_ms: 5_000,
            default_setup_estimate_secs: 300,
            seconds_per_wizard_step: 30,
            status_history_window: 10,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `PROVIDER_SETUP_*` environment variables
    ///
    /// Unparseable values fall back to the default for that field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            history_limit: env_or("HISTORY_LIMIT", defaults.history_limit),
            step_timeout_ms: env_or("STEP_TIMEOUT_MS", defaults.step_timeout_ms),
            connectivity_timeout_ms: env_or(
                "CONNECTIVITY_TIMEOUT_MS",
                defaults.connectivity_timeout_ms,
            ),
            default_setup_estimate_secs: env_or(
                "DEFAULT_SETUP_ESTIMATE_SECS",
                defaults.default_setup_estimate_secs,
            ),
            seconds_per_wizard_step: env_or(
                "SECONDS_PER_WIZARD_STEP",
                defaults.seconds_per_wizard_step,
            ),
            status_history_window: env_or(
                "STATUS_HISTORY_WINDOW",
                defaults.status_history_window,
            ),
            event_buffer: env_or("EVENT_BUFFER", defaults.event_buffer),
        }
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let config: Self = match extension.as_str() {
            "toml" => toml::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "history_limit".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.step_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "step_timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity_timeout_ms)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.status_history_window, 10);
        assert_eq!(config.step_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file_with_partial_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "history_limit = 25\nstep_timeout_ms = 1000").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.history_limit, 25);
        assert_eq!(config.step_timeout_ms, 1000);
        assert_eq!(config.seconds_per_wizard_step, 30);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "status_history_window: 5").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.status_history_window, 5);
    }

    #[test]
    fn test_invalid_history_limit_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "history_limit = 0").unwrap();

        let err = PipelineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = PipelineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
