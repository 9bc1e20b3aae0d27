//! Run progress records
//!
//! `SetupProgress` and `MigrationProgress` are the aggregate roots of one
//! setup or migration run. Both expose their step list through [`StepRun`]
//! so the same executor drives either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Initializing,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Initializing => write!(f, "initializing"),
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One unit of a setup or migration sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupStep {
    pub id: String,
    pub name: String,
    pub description: String,
    pub required: bool,
    /// Step ids that must be `completed` before this step may run
    pub dependencies: Vec<String>,
    pub estimated_time_secs: u64,
    pub status: StepStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SetupStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            required: true,
            dependencies: Vec::new(),
            estimated_time_secs: 0,
            status: StepStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }

    pub fn estimated_secs(mut self, secs: u64) -> Self {
        self.estimated_time_secs = secs;
        self
    }
}

/// Rollback sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    StopProvider,
    UnregisterProvider,
    RestoreBackup,
}

impl fmt::Display for RollbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackAction::StopProvider => write!(f, "stop_provider"),
            RollbackAction::UnregisterProvider => write!(f, "unregister_provider"),
            RollbackAction::RestoreBackup => write!(f, "restore_backup"),
        }
    }
}

/// Outcome of one rollback sub-action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "message")]
pub enum RollbackOutcome {
    Succeeded,
    Failed(String),
    Skipped(String),
}

/// One entry of a rollback report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub action: RollbackAction,
    pub target: String,
    pub outcome: RollbackOutcome,
}

/// What a best-effort rollback attempted and how each action ended
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub entries: Vec<RollbackEntry>,
}

impl RollbackReport {
    pub fn record(&mut self, action: RollbackAction, target: &str, outcome: RollbackOutcome) {
        self.entries.push(RollbackEntry {
            action,
            target: target.to_string(),
            outcome,
        });
    }

    /// True when no attempted action failed
    pub fn is_clean(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| matches!(e.outcome, RollbackOutcome::Failed(_)))
    }

    pub fn outcome_of(&self, action: RollbackAction) -> Option<&RollbackOutcome> {
        self.entries
            .iter()
            .find(|e| e.action == action)
            .map(|e| &e.outcome)
    }
}

/// Step bookkeeping shared by setup and migration progress
pub trait StepRun: Send + Sync {
    fn run_id(&self) -> &str;
    fn status(&self) -> RunStatus;
    fn steps(&self) -> &[SetupStep];
    fn steps_mut(&mut self) -> &mut Vec<SetupStep>;
    fn set_current_step(&mut self, step_id: Option<String>);
    fn mark_step_completed(&mut self);
    fn push_error(&mut self, error: String);
    fn push_warning(&mut self, warning: String);

    fn step(&self, step_id: &str) -> Option<&SetupStep> {
        self.steps().iter().find(|s| s.id == step_id)
    }

    fn step_mut(&mut self, step_id: &str) -> Option<&mut SetupStep> {
        self.steps_mut().iter_mut().find(|s| s.id == step_id)
    }

    fn is_cancelled(&self) -> bool {
        self.status() == RunStatus::Cancelled
    }
}

/// Aggregate root for one provider setup run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupProgress {
    pub setup_id: String,
    pub provider_name: String,
    pub provider_type: String,
    pub steps: Vec<SetupStep>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub current_step: Option<String>,
    pub status: RunStatus,
    pub estimated_total_time_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub rollback: Option<RollbackReport>,
}

impl SetupProgress {
    pub fn new(
        setup_id: impl Into<String>,
        provider_name: impl Into<String>,
        provider_type: impl Into<String>,
    ) -> Self {
        Self {
            setup_id: setup_id.into(),
            provider_name: provider_name.into(),
            provider_type: provider_type.into(),
            steps: Vec::new(),
            total_steps: 0,
            completed_steps: 0,
            current_step: None,
            status: RunStatus::Initializing,
            estimated_total_time_secs: 0,
            started_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            rollback: None,
        }
    }

    /// Install the step list and derived counters
    pub fn set_steps(&mut self, steps: Vec<SetupStep>) {
        self.total_steps = steps.len();
        self.estimated_total_time_secs = steps.iter().map(|s| s.estimated_time_secs).sum();
        self.steps = steps;
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

impl StepRun for SetupProgress {
    fn run_id(&self) -> &str {
        &self.setup_id
    }

    fn status(&self) -> RunStatus {
        self.status
    }

    fn steps(&self) -> &[SetupStep] {
        &self.steps
    }

    fn steps_mut(&mut self) -> &mut Vec<SetupStep> {
        &mut self.steps
    }

    fn set_current_step(&mut self, step_id: Option<String>) {
        self.current_step = step_id;
    }

    fn mark_step_completed(&mut self) {
        self.completed_steps = (self.completed_steps + 1).min(self.total_steps);
    }

    fn push_error(&mut self, error: String) {
        self.errors.push(error);
    }

    fn push_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Aggregate root for one provider migration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub migration_id: String,
    pub source_provider: String,
    pub target_provider: String,
    pub target_type: String,
    pub steps: Vec<SetupStep>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub current_step: Option<String>,
    pub status: RunStatus,
    pub estimated_total_time_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub rollback: Option<RollbackReport>,
}

impl MigrationProgress {
    pub fn new(
        migration_id: impl Into<String>,
        source_provider: impl Into<String>,
        target_provider: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            migration_id: migration_id.into(),
            source_provider: source_provider.into(),
            target_provider: target_provider.into(),
            target_type: target_type.into(),
            steps: Vec::new(),
            total_steps: 0,
            completed_steps: 0,
            current_step: None,
            status: RunStatus::Initializing,
            estimated_total_time_secs: 0,
            started_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            rollback: None,
        }
    }

    pub fn set_steps(&mut self, steps: Vec<SetupStep>) {
        self.total_steps = steps.len();
        self.estimated_total_time_secs = steps.iter().map(|s| s.estimated_time_secs).sum();
        self.steps = steps;
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

impl StepRun for MigrationProgress {
    fn run_id(&self) -> &str {
        &self.migration_id
    }

    fn status(&self) -> RunStatus {
        self.status
    }

    fn steps(&self) -> &[SetupStep] {
        &self.steps
    }

    fn steps_mut(&mut self) -> &mut Vec<SetupStep> {
        &mut self.steps
    }

    fn set_current_step(&mut self, step_id: Option<String>) {
        self.current_step = step_id;
    }

    fn mark_step_completed(&mut self) {
        self.completed_steps = (self.completed_steps + 1).min(self.total_steps);
    }

    fn push_error(&mut self, error: String) {
        self.errors.push(error);
    }

    fn push_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Progress record shared between a running task and readers
pub type Shared<T> = Arc<parking_lot::RwLock<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(parking_lot::RwLock::new(value))
}
