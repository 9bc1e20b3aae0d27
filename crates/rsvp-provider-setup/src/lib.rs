//! RSVP Provider Setup
//!
//! Automated provider setup and migration on top of the provider registry
//! contract.
//!
//! ## Features
//!
//! - **Step Executor**: dependency-aware, strictly sequential step execution
//!   with a handler registry keyed by step id
//! - **Setup Manager**: wizard answers to a running, verified provider
//! - **Migration Manager**: move a provider's portable configuration onto a
//!   new provider type
//! - **Rollback**: best-effort cleanup returning a report of every action
//!
//! ## Example
//!
//! ```rust
//! use rsvp_provider_core::{PipelineConfig, SandboxRegistry, WizardData};
//! use rsvp_provider_setup::{AutomatedSetupManager, SetupOptions};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let manager = AutomatedSetupManager::new(Arc::new(SandboxRegistry::new()), PipelineConfig::default());
//! let progress = manager
//!     .setup_provider("sqlite", &WizardData::new(), &SetupOptions::default())
//!     .await;
//! println!("{} finished as {}", progress.setup_id, progress.status);
//! # });
//! ```

pub mod error;
pub mod executor;
pub mod manager;
pub mod migration;
pub mod rollback;
pub mod steps;
pub mod wizard;

pub use error::{Result, SetupError};
pub use executor::{ExecutionPolicy, StepExecutor, StepHandler};
pub use manager::{AutomatedSetupManager, SetupOptions};
pub use migration::{MigrationContext, MigrationManager, MigrationOptions};
pub use rollback::{roll_back, RollbackPlan};
pub use steps::{setup_steps, SetupContext};
