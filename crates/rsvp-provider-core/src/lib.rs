//! RSVP Provider Core
//!
//! Shared foundation of the provider setup pipeline: the provider data
//! model, the Provider Registry contract, run progress records, the event
//! bus, configuration and metrics.
//!
//! ## Architecture
//!
//! 1. **Types** (`types`, `defaults`): provider configuration, wizard input,
//!    health and diagnostic payloads, and the per-type catalog.
//!
//! 2. **Registry** (`registry`): the contract the pipeline drives providers
//!    through. The pipeline never implements providers itself.
//!
//! 3. **Progress** (`progress`, `history`): setup and migration run records,
//!    active-run tracking and bounded history.
//!
//! 4. **Events** (`events`, `telemetry`): a broadcast bus shared by every
//!    component, with Prometheus metrics fed from it.
//!
//! 5. **Sandbox** (`sandbox`, `probe`): an in-memory registry and
//!    deterministic connectivity probes for dry runs and tests.
//!
//! ## Example
//!
//! ```rust
//! use rsvp_provider_core::{defaults::base_configuration, ProviderRegistry, SandboxRegistry};
//!
//! # tokio_test::block_on(async {
//! let registry = SandboxRegistry::new();
//! let config = base_configuration("postgresql", "guests-db");
//! registry.register_provider("guests-db", "postgresql", &config).await.unwrap();
//! registry.start_provider("guests-db").await.unwrap();
//! # });
//! ```

pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod history;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod sandbox;
pub mod telemetry;
pub mod types;

pub use config::PipelineConfig;
pub use defaults::{apply_wizard_data, build_configuration, defaults_for, ProviderDefaults};
pub use error::{ConfigError, RegistryError, RegistryResult};
pub use events::{EventBus, PipelineEvent};
pub use history::{BoundedHistory, RunStore, DEFAULT_HISTORY_LIMIT};
pub use probe::{ConnectivityProbe, ConnectivitySample, Endpoint, StaticProbe, TcpProbe};
pub use progress::{
    shared, MigrationProgress, RollbackAction, RollbackEntry, RollbackOutcome, RollbackReport,
    RunStatus, SetupProgress, SetupStep, Shared, StepRun, StepStatus,
};
pub use registry::{ProviderHandle, ProviderRegistry, SetupAutomation, WizardIntegration};
pub use sandbox::{SandboxAutomation, SandboxOp, SandboxProvider, SandboxRegistry};
pub use telemetry::{PipelineMetrics, TelemetryError};
pub use types::{
    failed_diagnostics, wizard_value, AutomationAction, AutomationStep, ConfigMap, DetailedHealth,
    DiagnosticResult, Diagnostics, HealthState, PerformanceSnapshot, ProviderCategory,
    ProviderConfiguration, ProviderHealthCheck, ProviderStatus, ProviderSummary, ValidationResult,
    WizardData, WizardField, WizardStep,
};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
