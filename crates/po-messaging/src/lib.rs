use po_core::{Alert, EpochMillis, Notification, Resource, SimulationResult, now_epoch_millis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod bus;
pub use bus::{EventBus, EventSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum DashboardEvent {
    NewAlert(Alert),
    AlertUpdated(Alert),
    ResourceUpdated(Resource),
    DataUpdated,
    SimulationStatus {
        phase: SimulationPhase,
        scenario: String,
    },
    SimulationComplete(SimulationResult),
    SimulationBatchComplete {
        total: usize,
        successful: usize,
    },
    EmergencyMode {
        enabled: bool,
    },
    TabChanged {
        tab_id: String,
        tab_name: String,
    },
    NotificationShown(Notification),
}

impl DashboardEvent {
    /// Stable name used for stream event types and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewAlert(_) => "new-alert",
            Self::AlertUpdated(_) => "alert-updated",
            Self::ResourceUpdated(_) => "resource-updated",
            Self::DataUpdated => "data-updated",
            Self::SimulationStatus { .. } => "simulation-status",
            Self::SimulationComplete(_) => "simulation-complete",
            Self::SimulationBatchComplete { .. } => "simulation-batch-complete",
            Self::EmergencyMode { .. } => "emergency-mode",
            Self::TabChanged { .. } => "tab-changed",
            Self::NotificationShown(_) => "notification-show",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: Uuid,
    pub emitted_at_ms: EpochMillis,
    pub source: String,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            emitted_at_ms: now_epoch_millis(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub metadata: EventMetadata,
    pub event: DashboardEvent,
}

impl EventEnvelope {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
