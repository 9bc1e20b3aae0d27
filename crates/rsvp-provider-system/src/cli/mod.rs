//! CLI for the provider setup pipeline
//!
//! Every command runs against a fresh [`SandboxRegistry`] with a static
//! connectivity probe, so results depend only on the wizard file and the
//! pipeline configuration.

pub mod commands;
pub mod output;

pub use commands::{SetupCli, SetupCommands};
pub use output::OutputFormat;

use anyhow::Context;
use rsvp_provider_core::{PipelineConfig, SandboxRegistry, StaticProbe, WizardData};
use rsvp_provider_setup::SetupOptions;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::error::SystemError;
use crate::facade::{CompleteSetupOptions, ProviderSetupSystem};

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded
    Success = 0,
    /// A run or validation failed
    Failed = 1,
    /// Unreadable input or configuration
    InvalidInput = 2,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Latency reported by the sandbox connectivity probe
const SANDBOX_LATENCY_MS: u64 = 1;

/// Read wizard answers from a JSON or YAML file
pub fn load_wizard(path: &Path) -> anyhow::Result<WizardData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading wizard file {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "yaml" | "yml"))
        .unwrap_or(false);

    let wizard = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing wizard file {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("parsing wizard file {}", path.display()))?
    };
    Ok(wizard)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading pipeline configuration {}", path.display())),
        None => Ok(PipelineConfig::from_env()),
    }
}

/// Build the sandbox-backed system used by every command
pub fn sandbox_system(config: PipelineConfig) -> Result<ProviderSetupSystem, SystemError> {
    ProviderSetupSystem::with_probe(
        Arc::new(SandboxRegistry::new()),
        Arc::new(StaticProbe::reachable(SANDBOX_LATENCY_MS)),
        config,
    )
}

/// Run a parsed command line
pub async fn run(cli: SetupCli) -> anyhow::Result<ExitCode> {
    let format = cli.format;
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(ExitCode::InvalidInput);
        }
    };
    let system = sandbox_system(config)?;

    match cli.command {
        SetupCommands::Setup {
            provider_type,
            wizard,
            backup,
            skip_optional,
            continue_on_warnings,
            validate_only,
            no_rollback,
            validate,
        } => {
            let wizard = match load_wizard(&wizard) {
                Ok(wizard) => wizard,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    return Ok(ExitCode::InvalidInput);
                }
            };
            let options = CompleteSetupOptions {
                setup: SetupOptions {
                    backup,
                    skip_optional_steps: skip_optional,
                    continue_on_warnings,
                    validate_only,
                    rollback_on_failure: !no_rollback,
                },
                validate_before: true,
                validate_after: validate,
                ..Default::default()
            };

            match system
                .setup_provider_complete(&provider_type, &wizard, &options)
                .await
            {
                Ok(outcome) => {
                    output::print(&outcome, format)?;
                    Ok(ExitCode::Success)
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    if let Some(progress) = system.setup_manager().recent_setup_history(1).first() {
                        output::print(progress, format)?;
                    }
                    Ok(ExitCode::Failed)
                }
            }
        }

        SetupCommands::ValidateSetup {
            provider_type,
            wizard,
        } => {
            let wizard = match load_wizard(&wizard) {
                Ok(wizard) => wizard,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    return Ok(ExitCode::InvalidInput);
                }
            };
            let result = system
                .setup_manager()
                .validate_setup(&provider_type, &wizard)
                .await;
            output::print(&result, format)?;
            Ok(if result.valid {
                ExitCode::Success
            } else {
                ExitCode::Failed
            })
        }

        SetupCommands::Estimate { provider_type } => {
            let seconds = system
                .setup_manager()
                .get_estimated_setup_time(&provider_type);
            output::print(
                &json!({"providerType": provider_type, "estimatedSeconds": seconds}),
                format,
            )?;
            Ok(ExitCode::Success)
        }

        SetupCommands::Rules => {
            output::print(&system.validator().rules(), format)?;
            Ok(ExitCode::Success)
        }

        SetupCommands::Status => {
            output::print(&system.get_system_status(), format)?;
            Ok(ExitCode::Success)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Failed), 1);
        assert_eq!(i32::from(ExitCode::InvalidInput), 2);
    }

    #[test]
    fn test_load_wizard_from_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "connection:\n  name: mailer\n  host: smtp.example.com").unwrap();
        let wizard = load_wizard(file.path()).unwrap();
        assert_eq!(wizard["connection"]["name"], "mailer");
    }

    #[test]
    fn test_load_wizard_reports_bad_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_wizard(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing wizard file"));
    }

    #[tokio::test]
    async fn test_setup_command_against_sandbox() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"connection": {{"name": "guest-cache", "path": "/tmp/rsvp.db"}}}}"#).unwrap();
        let cli = SetupCli {
            config: None,
            format: OutputFormat::Json,
            command: SetupCommands::Setup {
                provider_type: "sqlite".into(),
                wizard: file.path().to_path_buf(),
                backup: false,
                skip_optional: false,
                continue_on_warnings: false,
                validate_only: false,
                no_rollback: false,
                validate: true,
            },
        };
        assert_eq!(run(cli).await.unwrap(), ExitCode::Success);
    }

    #[tokio::test]
    async fn test_invalid_wizard_exits_with_failure() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"connection": {{}}}}"#).unwrap();
        let cli = SetupCli {
            config: None,
            format: OutputFormat::Json,
            command: SetupCommands::ValidateSetup {
                provider_type: "sendgrid".into(),
                wizard: file.path().to_path_buf(),
            },
        };
        assert_eq!(run(cli).await.unwrap(), ExitCode::Failed);
    }
}
