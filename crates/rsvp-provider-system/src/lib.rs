//! RSVP Provider Setup System
//!
//! End-to-end workflows over the provider pipeline: validate the wizard
//! answers, set up or migrate the provider, then validate the result.
//!
//! ## Features
//!
//! - **Complete setup**: pre-validation, setup with rollback, post-validation
//! - **Complete migration**: the same shape around the migration manager
//! - **System status**: active runs, recent history and the rule catalog
//! - **One event bus**: setup, migration and validation events on a single
//!   channel, observed by Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use rsvp_provider_core::{PipelineConfig, SandboxRegistry, WizardData};
//! use rsvp_provider_system::{CompleteSetupOptions, ProviderSetupSystem};
//! use std::sync::Arc;
//!
//! # async fn run() -> rsvp_provider_system::Result<()> {
//! let system = ProviderSetupSystem::new(Arc::new(SandboxRegistry::new()), PipelineConfig::default())?;
//! let options = CompleteSetupOptions {
//!     validate_before: true,
//!     validate_after: true,
//!     ..Default::default()
//! };
//! let outcome = system
//!     .setup_provider_complete("postgresql", &WizardData::new(), &options)
//!     .await?;
//! println!("{}", outcome.setup.status);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod facade;
pub mod logging;

pub use cli::{ExitCode, SetupCli};
pub use error::{Result, SystemError};
pub use facade::{
    CompleteMigration, CompleteMigrationOptions, CompleteSetup, CompleteSetupOptions,
    ProviderSetupSystem, SystemStatus,
};
pub use logging::{init_logging, LogFormat};

/// Run the CLI and map any unexpected error to an exit code
pub async fn run_cli(cli: SetupCli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::Failed
        }
    }
}
