//! Pipeline event bus
//!
//! One broadcast channel shared by the setup manager, the migration manager
//! and the validator. A subscriber to the bus observes the whole pipeline
//! without any component re-emitting another's events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::progress::{RollbackReport, RunStatus, StepStatus};
use crate::telemetry::PipelineMetrics;

/// Default broadcast capacity
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Events emitted while runs progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    SetupStarted {
        setup_id: String,
        provider_name: String,
        provider_type: String,
        at: DateTime<Utc>,
    },
    SetupStepFinished {
        run_id: String,
        step_id: String,
        status: StepStatus,
    },
    SetupCompleted {
        setup_id: String,
        provider_name: String,
        provider_type: String,
        status: RunStatus,
        duration_ms: i64,
    },
    SetupCancelled {
        setup_id: String,
        provider_name: String,
    },
    MigrationStarted {
        migration_id: String,
        source_provider: String,
        target_provider: String,
        at: DateTime<Utc>,
    },
    MigrationCompleted {
        migration_id: String,
        target_provider: String,
        status: RunStatus,
        duration_ms: i64,
    },
    MigrationCancelled {
        migration_id: String,
    },
    ValidationStarted {
        provider_name: String,
        at: DateTime<Utc>,
    },
    ValidationCompleted {
        report_id: String,
        provider_name: String,
        overall_result: String,
        compliance_score: u8,
        security_score: u8,
        performance_score: u8,
    },
    RollbackPerformed {
        run_id: String,
        report: RollbackReport,
    },
}

impl PipelineEvent {
    /// Stable event name, matching the serialized tag
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::SetupStarted { .. } => "setup_started",
            PipelineEvent::SetupStepFinished { .. } => "setup_step_finished",
            PipelineEvent::SetupCompleted { .. } => "setup_completed",
            PipelineEvent::SetupCancelled { .. } => "setup_cancelled",
            PipelineEvent::MigrationStarted { .. } => "migration_started",
            PipelineEvent::MigrationCompleted { .. } => "migration_completed",
            PipelineEvent::MigrationCancelled { .. } => "migration_cancelled",
            PipelineEvent::ValidationStarted { .. } => "validation_started",
            PipelineEvent::ValidationCompleted { .. } => "validation_completed",
            PipelineEvent::RollbackPerformed { .. } => "rollback_performed",
        }
    }
}

/// Cloneable handle to the shared broadcast channel
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            sender,
            metrics: None,
        }
    }

    /// Record every published event in the given metrics
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<PipelineMetrics>> {
        self.metrics.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: PipelineEvent) {
        if let Some(metrics) = &self.metrics {
            metrics.observe(&event);
        }
        tracing::trace!(event = event.name(), "Publishing pipeline event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(PipelineEvent::SetupCancelled {
            setup_id: "s".into(),
            provider_name: "p".into(),
        });
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(PipelineEvent::ValidationStarted {
            provider_name: "db".into(),
            at: Utc::now(),
        });
        bus.publish(PipelineEvent::MigrationCancelled {
            migration_id: "m".into(),
        });

        assert_eq!(rx.recv().await.unwrap().name(), "validation_started");
        assert_eq!(rx.recv().await.unwrap().name(), "migration_cancelled");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = PipelineEvent::SetupCancelled {
            setup_id: "s".into(),
            provider_name: "p".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "setup_cancelled");
    }
}
