//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::output::OutputFormat;

/// Provider setup pipeline CLI
///
/// Runs setup, validation and estimates against an in-process sandbox
/// registry, so wizard files can be checked without touching real services.
#[derive(Parser, Debug)]
#[command(name = "provider-setup")]
#[command(about = "Provider setup pipeline - set up, validate and inspect providers", long_about = None)]
#[command(version)]
pub struct SetupCli {
    /// Pipeline configuration file (TOML or YAML)
    ///
    /// Without it, defaults are read from PROVIDER_SETUP_* variables.
    #[arg(short, long, global = true, env = "PROVIDER_SETUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "json", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: SetupCommands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum SetupCommands {
    /// Run a complete provider setup
    Setup {
        /// Provider type (postgresql, smtp, s3, ...)
        #[arg(short = 't', long = "type")]
        provider_type: String,

        /// Wizard answers file (JSON or YAML), keyed by wizard step id
        #[arg(short, long)]
        wizard: PathBuf,

        /// Back up an existing provider of the same name first
        #[arg(long)]
        backup: bool,

        /// Leave out optional steps
        #[arg(long)]
        skip_optional: bool,

        /// Keep going when an optional step fails
        #[arg(long)]
        continue_on_warnings: bool,

        /// Only validate the wizard answers
        #[arg(long)]
        validate_only: bool,

        /// Do not roll back a failed setup
        #[arg(long)]
        no_rollback: bool,

        /// Validate the provider after setup
        #[arg(long)]
        validate: bool,
    },

    /// Validate wizard answers without running setup
    ValidateSetup {
        #[arg(short = 't', long = "type")]
        provider_type: String,

        #[arg(short, long)]
        wizard: PathBuf,
    },

    /// Estimated setup time for a provider type
    Estimate {
        #[arg(short = 't', long = "type")]
        provider_type: String,
    },

    /// List the registered validation rules
    Rules,

    /// Show the pipeline status
    Status,
}
