use crate::ids::{AlertId, NotificationId, ProtocolId, ResourceId};
use crate::severity::Severity;
use crate::time::EpochMillis;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Escalated,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
        }
    }
}

impl Default for AlertStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub created_at_ms: EpochMillis,
    pub time: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub protocol: ProtocolId,
    pub location: String,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub status: AlertStatus,
    pub description: String,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// Fields supplied when an alert is entered; id, time and status are assigned
/// by the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub protocol: ProtocolId,
    pub location: String,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPatch {
    pub severity: Option<Severity>,
    pub status: Option<AlertStatus>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub confidence: Option<f64>,
}

impl AlertPatch {
    pub fn status(status: AlertStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, alert: &mut Alert) {
        if let Some(severity) = self.severity {
            alert.severity = severity;
        }
        if let Some(status) = self.status {
            alert.status = status;
        }
        if let Some(location) = &self.location {
            alert.location = location.clone();
        }
        if let Some(description) = &self.description {
            alert.description = description.clone();
        }
        if let Some(confidence) = self.confidence {
            alert.confidence = confidence.clamp(0.0, 1.0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vehicle,
    Camera,
    Team,
    Drone,
    Sign,
}

impl ResourceKind {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Vehicle => "car",
            Self::Camera => "camera",
            Self::Team => "users",
            Self::Drone => "drone",
            Self::Sign => "sign",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceStatus {
    Available,
    Active,
    OnDuty,
    Charging,
    Maintenance,
    Deploying,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Active => "active",
            Self::OnDuty => "on-duty",
            Self::Charging => "charging",
            Self::Maintenance => "maintenance",
            Self::Deploying => "deploying",
        }
    }

    /// Resources counted as ready in stats and eligible for deployment.
    pub fn is_deployable(&self) -> bool {
        matches!(self, Self::Available | Self::Active)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePatch {
    pub status: Option<ResourceStatus>,
    pub location: Option<String>,
    pub battery: Option<u8>,
    pub message: Option<String>,
}

impl ResourcePatch {
    pub fn status(status: ResourceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, resource: &mut Resource) {
        if let Some(status) = self.status {
            resource.status = status;
        }
        if let Some(location) = &self.location {
            resource.location = location.clone();
        }
        if let Some(battery) = self.battery {
            resource.battery = Some(battery.min(100));
        }
        if let Some(message) = &self.message {
            resource.message = Some(message.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: ProtocolId,
    pub name: String,
    pub effectiveness: f64,
    pub last_used: String,
    pub triggers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub active_triggers: usize,
    pub response_time_s: f64,
    pub uptime_pct: f64,
    pub accidents_prevented: u32,
    pub lives_saved: f64,
    pub economic_impact: String,
    pub ai_effectiveness: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            active_triggers: 0,
            response_time_s: 8.2,
            uptime_pct: 99.8,
            accidents_prevented: 42,
            lives_saved: 4.2,
            economic_impact: "R21M".to_string(),
            ai_effectiveness: 92.5,
        }
    }
}

impl Metrics {
    /// Re-derives the counters that depend on alerts and protocols.
    pub fn recompute(&mut self, alerts: &[Alert], protocols: &[Protocol]) {
        self.active_triggers = alerts.iter().filter(|alert| alert.is_active()).count();
        if !protocols.is_empty() {
            self.ai_effectiveness = protocols
                .iter()
                .map(|protocol| protocol.effectiveness)
                .sum::<f64>()
                / protocols.len() as f64;
        }
    }

    pub fn response_time_label(&self) -> String {
        format!("{:.1}s", self.response_time_s)
    }

    pub fn uptime_label(&self) -> String {
        format!("{:.1}%", self.uptime_pct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub effectiveness: f64,
    pub last_trained_ms: EpochMillis,
    pub scenarios_tested: u32,
}

impl Playbook {
    pub const BASELINE_EFFECTIVENESS: f64 = 75.0;

    pub fn seeded(now_ms: EpochMillis) -> Self {
        Self {
            effectiveness: 92.5,
            last_trained_ms: now_ms,
            scenarios_tested: 42,
        }
    }

    pub fn baseline(now_ms: EpochMillis) -> Self {
        Self {
            effectiveness: Self::BASELINE_EFFECTIVENESS,
            last_trained_ms: now_ms,
            scenarios_tested: 0,
        }
    }
}

/// Parameters of a simulated scenario. Only the fields a scenario defines are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_density: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accident_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pedestrian_density: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crosswalk_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_hours: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_dropoff: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alcohol_risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement_presence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicles_involved: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_closures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_backup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutcomes {
    pub risk_reduction: String,
    pub response_time: String,
    pub protocol_effectiveness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario_key: String,
    pub scenario: String,
    pub risk_reduction: f64,
    pub risk_reduction_label: String,
    pub response_time_s: f64,
    pub response_time_label: String,
    pub accuracy: f64,
    pub recommendations: Vec<String>,
    pub parameters: ScenarioParameters,
    pub expected_outcomes: ExpectedOutcomes,
    pub processing_time_ms: u64,
    pub timestamp_ms: EpochMillis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationLevel {
    pub fn default_duration_ms(&self) -> u64 {
        match self {
            Self::Success | Self::Info => 4000,
            Self::Warning => 5000,
            Self::Error => 6000,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Success => "check-circle",
            Self::Error => "exclamation-circle",
            Self::Warning => "exclamation-triangle",
            Self::Info => "info-circle",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub duration_ms: u64,
    pub timestamp_ms: EpochMillis,
    #[serde(default)]
    pub read: bool,
}
