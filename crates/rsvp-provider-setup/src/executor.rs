//! Dependency-aware step executor
//!
//! Runs the step list of one setup or migration run strictly in list order.
//! Each step id maps to a [`StepHandler`] in a registry, so new step kinds
//! are added by registering a handler rather than editing a dispatcher.
//!
//! Per step:
//! 1. stop if the run was cancelled
//! 2. skip (without invoking the handler) when a dependency is missing or
//!    not `completed`
//! 3. run the handler under the step timeout
//! 4. record the outcome; a failed required step aborts the run

use async_trait::async_trait;
use chrono::Utc;
use rsvp_provider_core::{EventBus, PipelineEvent, Shared, StepRun, StepStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{Result, SetupError};

/// Handler for one step id, executed against a run context `C`
#[async_trait]
pub trait StepHandler<C>: Send + Sync {
    /// Perform the step; the returned value becomes the step's `result`
    async fn run(&self, ctx: &C) -> Result<Value>;
}

/// Failure policy for optional steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Record a failed optional step as a warning and keep going
    pub continue_on_warnings: bool,
}

/// Executes step lists against a handler registry
pub struct StepExecutor<C> {
    handlers: HashMap<String, Arc<dyn StepHandler<C>>>,
    step_timeout: Duration,
    events: EventBus,
}

enum Dispatch<C> {
    Stop,
    Skip,
    Run {
        handler: Arc<dyn StepHandler<C>>,
        required: bool,
    },
}

impl<C: Send + Sync> StepExecutor<C> {
    pub fn new(step_timeout: Duration, events: EventBus) -> Self {
        Self {
            handlers: HashMap::new(),
            step_timeout,
            events,
        }
    }

    /// Register (or replace) the handler for a step id
    pub fn register(&mut self, step_id: impl Into<String>, handler: Arc<dyn StepHandler<C>>) {
        self.handlers.insert(step_id.into(), handler);
    }

    pub fn with_handler(mut self, step_id: impl Into<String>, handler: Arc<dyn StepHandler<C>>) -> Self {
        self.register(step_id, handler);
        self
    }

    pub fn has_handler(&self, step_id: &str) -> bool {
        self.handlers.contains_key(step_id)
    }

    /// Execute every step of the run in list order
    ///
    /// Returns `Ok(())` when all steps were visited or the run was cancelled.
    /// A failed required step (or a failed optional step without
    /// `continue_on_warnings`) yields [`SetupError::StepFailed`]; the error
    /// has already been appended to the run when that happens.
    pub async fn execute<R: StepRun>(&self, run: &Shared<R>, ctx: &C, policy: ExecutionPolicy) -> Result<()> {
        let (run_id, step_ids) = {
            let guard = run.read();
            let ids: Vec<String> = guard.steps().iter().map(|s| s.id.clone()).collect();
            (guard.run_id().to_string(), ids)
        };

        for step_id in step_ids {
            let dispatch = self.prepare_step(run, &step_id)?;
            let (handler, required) = match dispatch {
                Dispatch::Stop => {
                    tracing::info!(run_id = %run_id, step = %step_id, "Run cancelled, stopping step execution");
                    return Ok(());
                }
                Dispatch::Skip => {
                    tracing::debug!(run_id = %run_id, step = %step_id, "Dependencies not completed, skipping step");
                    self.publish_step(&run_id, &step_id, StepStatus::Skipped);
                    continue;
                }
                Dispatch::Run { handler, required } => (handler, required),
            };

            tracing::debug!(run_id = %run_id, step = %step_id, "Executing step");
            let outcome = match timeout(self.step_timeout, handler.run(ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SetupError::StepTimeout {
                    step: step_id.clone(),
                    timeout_ms: self.step_timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(value) => {
                    {
                        let mut guard = run.write();
                        if let Some(step) = guard.step_mut(&step_id) {
                            step.status = StepStatus::Completed;
                            step.result = Some(value);
                            step.completed_at = Some(Utc::now());
                        }
                        guard.mark_step_completed();
                    }
                    tracing::debug!(run_id = %run_id, step = %step_id, "Step completed");
                    self.publish_step(&run_id, &step_id, StepStatus::Completed);
                }
                Err(err) => {
                    let failure = SetupError::step_failed(&step_id, failure_message(err));
                    let fatal = required || !policy.continue_on_warnings;
                    {
                        let mut guard = run.write();
                        if let Some(step) = guard.step_mut(&step_id) {
                            step.status = StepStatus::Failed;
                            step.error = Some(failure_message(failure.clone()));
                            step.completed_at = Some(Utc::now());
                        }
                        if fatal {
                            guard.push_error(failure.to_string());
                        } else {
                            guard.push_warning(format!("Optional {}", failure));
                        }
                    }
                    self.publish_step(&run_id, &step_id, StepStatus::Failed);

                    if fatal {
                        tracing::error!(run_id = %run_id, step = %step_id, error = %failure, "Step failed");
                        return Err(failure);
                    }
                    tracing::warn!(run_id = %run_id, step = %step_id, error = %failure, "Optional step failed, continuing");
                }
            }
        }

        run.write().set_current_step(None);
        Ok(())
    }

    /// Decide what to do with a step and mark it in progress when it runs
    fn prepare_step<R: StepRun>(&self, run: &Shared<R>, step_id: &str) -> Result<Dispatch<C>> {
        let mut guard = run.write();
        if guard.is_cancelled() {
            return Ok(Dispatch::Stop);
        }

        let Some(step) = guard.step(step_id) else {
            return Ok(Dispatch::Skip);
        };
        let dependencies_met = step.dependencies.iter().all(|dep| {
            guard
                .step(dep)
                .map(|d| d.status == StepStatus::Completed)
                .unwrap_or(false)
        });
        let required = step.required;

        if !dependencies_met {
            if let Some(step) = guard.step_mut(step_id) {
                step.status = StepStatus::Skipped;
            }
            return Ok(Dispatch::Skip);
        }

        let handler = self
            .handlers
            .get(step_id)
            .cloned()
            .ok_or_else(|| SetupError::UnknownStep(step_id.to_string()))?;

        guard.set_current_step(Some(step_id.to_string()));
        if let Some(step) = guard.step_mut(step_id) {
            step.status = StepStatus::InProgress;
            step.started_at = Some(Utc::now());
        }
        Ok(Dispatch::Run { handler, required })
    }

    fn publish_step(&self, run_id: &str, step_id: &str, status: StepStatus) {
        self.events.publish(PipelineEvent::SetupStepFinished {
            run_id: run_id.to_string(),
            step_id: step_id.to_string(),
            status,
        });
    }
}

fn failure_message(err: SetupError) -> String {
    match err {
        SetupError::StepFailed { message, .. } => message,
        other => other.to_string(),
    }
}
