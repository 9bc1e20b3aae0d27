//! Provider setup CLI
//!
//! # Usage
//!
//! ```bash
//! # Set up a provider from wizard answers and validate it afterwards
//! provider-setup setup --type postgresql --wizard wizard.json --validate
//!
//! # Check wizard answers only
//! provider-setup validate-setup --type smtp --wizard mail.yaml
//!
//! # Estimated setup time, rule catalog, pipeline status
//! provider-setup estimate --type s3
//! provider-setup rules --format yaml
//! provider-setup status
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Setup or validation failed
//! - 2: Invalid input or configuration

use clap::Parser;
use rsvp_provider_system::{init_logging, run_cli, LogFormat, SetupCli};

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(LogFormat::from_env()) {
        eprintln!("Logging unavailable: {}", e);
    }

    let cli = SetupCli::parse();
    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}
