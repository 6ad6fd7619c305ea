use po_core::{
    Alert, AlertId, AlertPatch, AlertStatus, EpochMillis, ErrorCode, Metrics, NewAlert, Playbook,
    PoError, PoResult, Protocol, ProtocolId, RandomSource, Resource, ResourceId, ResourcePatch,
    clock_label, now_epoch_millis,
};
use po_observability::{ACTIVE_ALERTS, ALERTS_CREATED_TOTAL, ALERTS_ESCALATED_TOTAL, PERSIST_FAILURES_TOTAL};
use po_storage::{KeyValueStore, persist_best_effort};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::seed::{ALERT_TEMPLATES, sample_alerts, sample_protocols, sample_resources};

const RESPONSE_TIME_FLOOR_S: f64 = 4.0;
const RESPONSE_TIME_CEILING_S: f64 = 12.0;
const EFFECTIVENESS_CEILING: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default = "default_playbook")]
    pub playbook: Playbook,
}

fn default_playbook() -> Playbook {
    Playbook::baseline(0)
}

impl Default for DataSnapshot {
    fn default() -> Self {
        Self {
            alerts: Vec::new(),
            resources: Vec::new(),
            protocols: Vec::new(),
            metrics: Metrics::default(),
            playbook: default_playbook(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle<'a, S: Serialize> {
    pub metrics: Metrics,
    pub alerts: Vec<Alert>,
    pub protocols: Vec<Protocol>,
    pub simulations: &'a [S],
    pub export_date_ms: EpochMillis,
    pub system_version: String,
}

pub struct DataStore {
    state: RwLock<DataSnapshot>,
    // Held from mutation through persist so snapshots land in mutation order.
    save: Mutex<()>,
    storage: Arc<dyn KeyValueStore>,
    key: String,
    auto_save: bool,
}

impl DataStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(DataSnapshot::default()),
            save: Mutex::new(()),
            storage,
            key: key.into(),
            auto_save: true,
        }
    }

    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }

    /// Loads the persisted snapshot and seeds sample data when no alerts exist.
    /// An unreadable store is an error; a corrupt blob is dropped and reseeded.
    pub async fn init(&self) -> PoResult<()> {
        let raw = self.storage.get(&self.key).await.map_err(|err| {
            tracing::error!(key = %self.key, error = %err, "could not read data from storage");
            PoError::new(ErrorCode::Storage, format!("could not read {}: {err}", self.key))
        })?;
        if let Some(raw) = raw {
            match serde_json::from_str::<DataSnapshot>(&raw) {
                Ok(saved) => {
                    *self.state.write().await = saved;
                    tracing::info!(key = %self.key, "data loaded from storage");
                }
                Err(err) => {
                    tracing::warn!(key = %self.key, error = %err, "stored data is corrupt, starting fresh");
                }
            }
        }

        let _ordered = self.save.lock().await;
        let seeded = {
            let mut state = self.state.write().await;
            if state.alerts.is_empty() {
                let now = now_epoch_millis();
                state.alerts = sample_alerts(now);
                state.resources = sample_resources();
                state.protocols = sample_protocols();
                state.metrics = Metrics::default();
                state.playbook = Playbook::seeded(now);
                recompute(&mut state);
                Some(state.clone())
            } else {
                recompute(&mut state);
                None
            }
        };
        if let Some(snapshot) = seeded {
            tracing::info!(
                alerts = snapshot.alerts.len(),
                resources = snapshot.resources.len(),
                protocols = snapshot.protocols.len(),
                "seeded sample data"
            );
            self.persist(&snapshot).await;
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> DataSnapshot {
        self.state.read().await.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.state.read().await.alerts.clone()
    }

    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.state
            .read()
            .await
            .alerts
            .iter()
            .filter(|alert| alert.is_active())
            .cloned()
            .collect()
    }

    pub async fn find_alert(&self, id: &AlertId) -> Option<Alert> {
        self.state
            .read()
            .await
            .alerts
            .iter()
            .find(|alert| &alert.id == id)
            .cloned()
    }

    pub async fn resources(&self) -> Vec<Resource> {
        self.state.read().await.resources.clone()
    }

    pub async fn find_resource(&self, id: &ResourceId) -> Option<Resource> {
        self.state
            .read()
            .await
            .resources
            .iter()
            .find(|resource| &resource.id == id)
            .cloned()
    }

    pub async fn protocols(&self) -> Vec<Protocol> {
        self.state.read().await.protocols.clone()
    }

    pub async fn metrics(&self) -> Metrics {
        self.state.read().await.metrics.clone()
    }

    pub async fn playbook(&self) -> Playbook {
        self.state.read().await.playbook.clone()
    }

    /// Assigns id, time and active status, then prepends the alert.
    pub async fn add_alert(&self, new: NewAlert) -> Alert {
        let now = now_epoch_millis();
        let alert = Alert {
            id: AlertId::generate(),
            created_at_ms: now,
            time: clock_label(now),
            alert_type: new.alert_type,
            protocol: new.protocol,
            location: new.location,
            severity: new.severity,
            confidence: new.confidence.clamp(0.0, 1.0),
            status: AlertStatus::Active,
            description: new.description,
        };

        let _ordered = self.save.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            state.alerts.insert(0, alert.clone());
            if let Some(protocol) = state
                .protocols
                .iter_mut()
                .find(|protocol| protocol.id == alert.protocol)
            {
                protocol.triggers += 1;
                protocol.last_used = alert.time[..5].to_string();
            }
            recompute(&mut state);
            state.clone()
        };
        metrics::counter!(ALERTS_CREATED_TOTAL).increment(1);
        self.persist(&snapshot).await;
        alert
    }

    pub async fn update_alert(&self, id: &AlertId, patch: AlertPatch) -> Option<Alert> {
        self.modify_alert(id, |alert| patch.apply(alert)).await
    }

    async fn modify_alert(&self, id: &AlertId, change: impl FnOnce(&mut Alert)) -> Option<Alert> {
        let _ordered = self.save.lock().await;
        let (updated, snapshot) = {
            let mut state = self.state.write().await;
            let alert = state.alerts.iter_mut().find(|alert| &alert.id == id)?;
            change(alert);
            let updated = alert.clone();
            recompute(&mut state);
            (updated, state.clone())
        };
        self.persist(&snapshot).await;
        Some(updated)
    }

    /// Raises severity one level (ceiling critical) and marks the alert escalated.
    pub async fn escalate_alert(&self, id: &AlertId) -> Option<Alert> {
        let updated = self
            .modify_alert(id, |alert| {
                alert.severity = alert.severity.escalated();
                alert.status = AlertStatus::Escalated;
            })
            .await;
        if updated.is_some() {
            metrics::counter!(ALERTS_ESCALATED_TOTAL).increment(1);
        }
        updated
    }

    pub async fn acknowledge_alert(&self, id: &AlertId) -> Option<Alert> {
        self.update_alert(id, AlertPatch::status(AlertStatus::Acknowledged))
            .await
    }

    pub async fn resolve_alert(&self, id: &AlertId) -> Option<Alert> {
        self.update_alert(id, AlertPatch::status(AlertStatus::Resolved))
            .await
    }

    /// Acknowledges every active alert; returns how many changed.
    pub async fn acknowledge_all(&self) -> usize {
        let _ordered = self.save.lock().await;
        let (count, snapshot) = {
            let mut state = self.state.write().await;
            let mut count = 0;
            for alert in state.alerts.iter_mut().filter(|alert| alert.is_active()) {
                alert.status = AlertStatus::Acknowledged;
                count += 1;
            }
            recompute(&mut state);
            (count, state.clone())
        };
        if count > 0 {
            self.persist(&snapshot).await;
        }
        count
    }

    /// Drops every non-active alert from the list; returns how many were dropped.
    pub async fn clear_resolved(&self) -> usize {
        let _ordered = self.save.lock().await;
        let (count, snapshot) = {
            let mut state = self.state.write().await;
            let before = state.alerts.len();
            state.alerts.retain(Alert::is_active);
            recompute(&mut state);
            (before - state.alerts.len(), state.clone())
        };
        self.persist(&snapshot).await;
        count
    }

    pub async fn update_resource(&self, id: &ResourceId, patch: ResourcePatch) -> Option<Resource> {
        let _ordered = self.save.lock().await;
        let (updated, snapshot) = {
            let mut state = self.state.write().await;
            let resource = state
                .resources
                .iter_mut()
                .find(|resource| &resource.id == id)?;
            patch.apply(resource);
            let updated = resource.clone();
            recompute(&mut state);
            (updated, state.clone())
        };
        self.persist(&snapshot).await;
        Some(updated)
    }

    /// Generates and stores an alert from one of the fixed templates.
    pub async fn simulate_random_alert(&self, rng: &dyn RandomSource) -> Alert {
        let (alert_type, protocol, severity) = ALERT_TEMPLATES[rng.index(ALERT_TEMPLATES.len())];
        let locations = [
            format!("M1 Highway, KM {:.1}", rng.range(5.0, 25.0)),
            format!("N1 Highway, KM {:.1}", rng.range(3.0, 18.0)),
            format!("CBD Intersection {}", 1 + rng.index(10)),
            format!("R24 Highway, KM {:.1}", rng.range(2.0, 14.0)),
            format!("School Zone {}", (b'A' + rng.index(5) as u8) as char),
        ];
        let location = locations[rng.index(locations.len())].clone();
        let confidence = (rng.range(0.7, 1.0) * 100.0).round() / 100.0;

        self.add_alert(NewAlert {
            alert_type: alert_type.to_string(),
            protocol: ProtocolId::from(protocol),
            location,
            severity,
            confidence,
            description: format!("Simulated {} detected", alert_type.to_lowercase()),
        })
        .await
    }

    /// Random walk of the displayed response time within [4, 12] seconds.
    /// Metrics are derived, so this is not persisted.
    pub async fn jitter_response_time(&self, rng: &dyn RandomSource) -> Metrics {
        let mut state = self.state.write().await;
        let current = state.metrics.response_time_s;
        let next = current + (rng.next_f64() - 0.5) * 0.5;
        state.metrics.response_time_s = next.clamp(RESPONSE_TIME_FLOOR_S, RESPONSE_TIME_CEILING_S);
        recompute(&mut state);
        state.metrics.clone()
    }

    pub async fn recalculate_metrics(&self) -> Metrics {
        let mut state = self.state.write().await;
        recompute(&mut state);
        state.metrics.clone()
    }

    pub async fn replace_playbook(&self, playbook: Playbook) -> Playbook {
        let _ordered = self.save.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            state.playbook = playbook.clone();
            state.clone()
        };
        self.persist(&snapshot).await;
        playbook
    }

    /// Adds `delta` percentage points to playbook effectiveness (ceiling 100).
    pub async fn nudge_playbook(&self, delta: f64) -> Playbook {
        let _ordered = self.save.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            state.playbook.effectiveness =
                (state.playbook.effectiveness + delta).min(EFFECTIVENESS_CEILING);
            state.clone()
        };
        self.persist(&snapshot).await;
        snapshot.playbook
    }

    pub async fn mark_trained(&self, at_ms: EpochMillis) -> Playbook {
        let _ordered = self.save.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            state.playbook.last_trained_ms = at_ms;
            state.clone()
        };
        self.persist(&snapshot).await;
        snapshot.playbook
    }

    /// Raises one protocol's effectiveness by `delta` points (ceiling 100).
    pub async fn record_protocol_feedback(&self, id: &ProtocolId, delta: f64) -> Option<Protocol> {
        let _ordered = self.save.lock().await;
        let (updated, snapshot) = {
            let mut state = self.state.write().await;
            let protocol = state
                .protocols
                .iter_mut()
                .find(|protocol| &protocol.id == id)?;
            protocol.effectiveness = (protocol.effectiveness + delta).min(EFFECTIVENESS_CEILING);
            let updated = protocol.clone();
            recompute(&mut state);
            (updated, state.clone())
        };
        self.persist(&snapshot).await;
        Some(updated)
    }

    /// Empties memory and removes the persisted blob.
    pub async fn clear(&self) {
        let _ordered = self.save.lock().await;
        *self.state.write().await = DataSnapshot::default();
        if let Err(err) = self.storage.remove(&self.key).await {
            tracing::warn!(key = %self.key, error = %err, "could not remove stored data");
        }
        tracing::info!("all data cleared");
    }

    pub async fn export_bundle<'a, S: Serialize>(
        &self,
        simulations: &'a [S],
        system_version: &str,
    ) -> ExportBundle<'a, S> {
        let state = self.state.read().await;
        ExportBundle {
            metrics: state.metrics.clone(),
            alerts: state.alerts.clone(),
            protocols: state.protocols.clone(),
            simulations,
            export_date_ms: now_epoch_millis(),
            system_version: system_version.to_string(),
        }
    }

    async fn persist(&self, snapshot: &DataSnapshot) {
        if !self.auto_save {
            return;
        }
        if !persist_best_effort(self.storage.as_ref(), &self.key, snapshot).await {
            metrics::counter!(PERSIST_FAILURES_TOTAL, "key" => self.key.clone()).increment(1);
        }
    }
}

fn recompute(state: &mut DataSnapshot) {
    state.metrics.recompute(&state.alerts, &state.protocols);
    metrics::gauge!(ACTIVE_ALERTS).set(state.metrics.active_triggers as f64);
}
