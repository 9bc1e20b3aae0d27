//! Prometheus metrics for the provider pipeline
//!
//! Metrics are fed from the event bus, so every component is measured
//! through the same events subscribers see:
//! - `setup_runs_total` (counter) - finished setup runs by status
//! - `setup_duration_seconds` (histogram) - setup run duration
//! - `setup_steps_total` (counter) - step outcomes by step id and status
//! - `migration_runs_total` (counter) - finished migrations by status
//! - `validation_reports_total` (counter) - validation reports by result
//! - `validation_score` (gauge) - latest composite scores by provider and kind
//! - `rollback_actions_total` (counter) - rollback actions by action and outcome

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;

use crate::events::PipelineEvent;
use crate::progress::RollbackOutcome;

const NAMESPACE: &str = "provider_setup";

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Pipeline metrics registered in a Prometheus registry
pub struct PipelineMetrics {
    registry: Arc<Registry>,
    setup_runs_total: CounterVec,
    setup_duration_seconds: HistogramVec,
    setup_steps_total: CounterVec,
    migration_runs_total: CounterVec,
    validation_reports_total: CounterVec,
    validation_score: GaugeVec,
    rollback_actions_total: CounterVec,
}

impl PipelineMetrics {
    /// Create metrics in a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create metrics and register them with the provided registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let setup_runs_total = CounterVec::new(
            Opts::new("setup_runs_total", "Finished provider setup runs").namespace(NAMESPACE),
            &["provider_type", "status"],
        )?;

        let setup_duration_seconds = HistogramVec::new(
            HistogramOpts::new("setup_duration_seconds", "Provider setup run duration in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["status"],
        )?;

        let setup_steps_total = CounterVec::new(
            Opts::new("setup_steps_total", "Setup and migration step outcomes").namespace(NAMESPACE),
            &["step", "status"],
        )?;

        let migration_runs_total = CounterVec::new(
            Opts::new("migration_runs_total", "Finished provider migrations").namespace(NAMESPACE),
            &["status"],
        )?;

        let validation_reports_total = CounterVec::new(
            Opts::new("validation_reports_total", "Provider validation reports by overall result")
                .namespace(NAMESPACE),
            &["result"],
        )?;

        let validation_score = GaugeVec::new(
            Opts::new("validation_score", "Latest composite validation score (0 - 100)")
                .namespace(NAMESPACE),
            &["provider", "kind"],
        )?;

        let rollback_actions_total = CounterVec::new(
            Opts::new("rollback_actions_total", "Rollback actions by outcome").namespace(NAMESPACE),
            &["action", "outcome"],
        )?;

        registry.register(Box::new(setup_runs_total.clone()))?;
        registry.register(Box::new(setup_duration_seconds.clone()))?;
        registry.register(Box::new(setup_steps_total.clone()))?;
        registry.register(Box::new(migration_runs_total.clone()))?;
        registry.register(Box::new(validation_reports_total.clone()))?;
        registry.register(Box::new(validation_score.clone()))?;
        registry.register(Box::new(rollback_actions_total.clone()))?;

        Ok(Self {
            registry,
            setup_runs_total,
            setup_duration_seconds,
            setup_steps_total,
            migration_runs_total,
            validation_reports_total,
            validation_score,
            rollback_actions_total,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Update metrics from a pipeline event
    pub fn observe(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::SetupStepFinished { step_id, status, .. } => {
                let status = status.to_string();
                self.setup_steps_total
                    .with_label_values(&[step_id.as_str(), status.as_str()])
                    .inc();
            }
            PipelineEvent::SetupCompleted {
                provider_type,
                status,
                duration_ms,
                ..
            } => {
                let status = status.to_string();
                self.setup_runs_total
                    .with_label_values(&[provider_type.as_str(), status.as_str()])
                    .inc();
                self.setup_duration_seconds
                    .with_label_values(&[status.as_str()])
                    .observe((*duration_ms).max(0) as f64 / 1000.0);
            }
            PipelineEvent::MigrationCompleted { status, .. } => {
                let status = status.to_string();
                self.migration_runs_total
                    .with_label_values(&[status.as_str()])
                    .inc();
            }
            PipelineEvent::ValidationCompleted {
                provider_name,
                overall_result,
                compliance_score,
                security_score,
                performance_score,
                ..
            } => {
                self.validation_reports_total
                    .with_label_values(&[overall_result.as_str()])
                    .inc();
                for (kind, score) in [
                    ("compliance", compliance_score),
                    ("security", security_score),
                    ("performance", performance_score),
                ] {
                    self.validation_score
                        .with_label_values(&[provider_name.as_str(), kind])
                        .set(f64::from(*score));
                }
            }
            PipelineEvent::RollbackPerformed { report, .. } => {
                for entry in &report.entries {
                    let outcome = match entry.outcome {
                        RollbackOutcome::Succeeded => "succeeded",
                        RollbackOutcome::Failed(_) => "failed",
                        RollbackOutcome::Skipped(_) => "skipped",
                    };
                    let action = entry.action.to_string();
                    self.rollback_actions_total
                        .with_label_values(&[action.as_str(), outcome])
                        .inc();
                }
            }
            _ => {}
        }
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingError(e.to_string()))
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{RollbackAction, RollbackReport, RunStatus, StepStatus};

    #[test]
    fn test_metrics_registration() {
        let metrics = PipelineMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_observe_step_and_rollback() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.observe(&PipelineEvent::SetupStepFinished {
            run_id: "setup-1".into(),
            step_id: "register-provider".into(),
            status: StepStatus::Completed,
        });

        let mut report = RollbackReport::default();
        report.record(RollbackAction::StopProvider, "db", RollbackOutcome::Succeeded);
        metrics.observe(&PipelineEvent::RollbackPerformed {
            run_id: "setup-1".into(),
            report,
        });
        metrics.observe(&PipelineEvent::SetupCompleted {
            setup_id: "setup-1".into(),
            provider_name: "db".into(),
            provider_type: "postgresql".into(),
            status: RunStatus::Failed,
            duration_ms: 1500,
        });

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("provider_setup_setup_steps_total"));
        assert!(text.contains("register-provider"));
        assert!(text.contains("provider_setup_rollback_actions_total"));
        assert!(text.contains("provider_setup_setup_duration_seconds"));
    }

    #[test]
    fn test_validation_scores_gauge() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.observe(&PipelineEvent::ValidationCompleted {
            report_id: "r".into(),
            provider_name: "db".into(),
            overall_result: "passed".into(),
            compliance_score: 100,
            security_score: 80,
            performance_score: 75,
        });

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("provider_setup_validation_score"));
        assert!(text.contains("kind=\"security\""));
    }
}
