//! Logging initialisation for binaries embedding the pipeline

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable switching the output to JSON lines
pub const LOG_JSON_ENV: &str = "PROVIDER_SETUP_LOG_JSON";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// JSON when `PROVIDER_SETUP_LOG_JSON` is `true` or `1`, compact otherwise
    pub fn from_env() -> Self {
        match std::env::var(LOG_JSON_ENV) {
            Ok(value) if matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1") => {
                LogFormat::Json
            }
            _ => LogFormat::Compact,
        }
    }
}

/// Install the global subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Logs go to
/// stderr so command output on stdout stays machine readable.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let _ = init_logging(LogFormat::Compact);
        assert!(init_logging(LogFormat::Json).is_err());
    }
}
