use po_config::{AppSettings, Cadence};
use po_core::{
    Alert, AlertId, EpochMillis, ErrorCode, NotificationId, NotificationLevel, Playbook, PoError,
    PoResult, RandomSource, Resource, ResourceId, ResourcePatch, ResourceStatus, Severity,
    SimulationResult, date_label, now_epoch_millis,
};
use po_data::DataStore;
use po_messaging::{DashboardEvent, EventBus, EventSubscriber};
use po_notify::{NotificationCenter, ToastRequest};
use po_prediction::{Prediction, PredictionService, RiskFeatures, TrainingReport, TrainingSample};
use po_simulation::{BatchReport, ScenarioSimulator};
use po_storage::{APP_STATE_KEY, KeyValueStore, load_json, persist_best_effort};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::map::{LayerKind, MapPresentation, MapView};
use crate::tabs::{PaneSource, Tab, TabRouter, TabView};
use crate::views::{ImpactChart, UiParts, UiRefresher};

const SOURCE: &str = "orchestrator";
const WELCOME_DELAY_MS: u64 = 1_000;
const ESCALATION_DELAY_MS: u64 = 2_000;
const DEPLOYMENT_DELAY_MS: u64 = 2_000;
const DEPLOYMENT_BATCH: usize = 3;
const PLAYBOOK_ACCURACY_FLOOR: f64 = 0.9;
const PLAYBOOK_GAIN: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Uninitialized,
    Initializing,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Data,
    Prediction,
    Simulation,
    Tabs,
    Map,
    Notifications,
    Ui,
}

impl Module {
    pub const ORDER: [Module; 7] = [
        Module::Data,
        Module::Prediction,
        Module::Simulation,
        Module::Tabs,
        Module::Map,
        Module::Notifications,
        Module::Ui,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Prediction => "prediction",
            Self::Simulation => "simulation",
            Self::Tabs => "tabs",
            Self::Map => "map",
            Self::Notifications => "notifications",
            Self::Ui => "ui",
        }
    }
}

/// Session state kept across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStateRecord {
    pub emergency_mode: bool,
    pub last_active_ms: EpochMillis,
    #[serde(default)]
    pub module_status: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub state: OrchestratorState,
    pub emergency_mode: bool,
    pub modules: BTreeMap<String, bool>,
    pub loops: usize,
    pub current_tab: Tab,
    pub config: AppSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub body: String,
}

struct Monitoring {
    cancel: CancellationToken,
    loops: usize,
}

struct Inner {
    settings: AppSettings,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
    rng: Arc<dyn RandomSource>,
    data: Arc<DataStore>,
    prediction: Arc<PredictionService>,
    simulator: Arc<ScenarioSimulator>,
    tabs: TabRouter,
    map: Arc<MapPresentation>,
    notifications: NotificationCenter,
    ui: Arc<UiRefresher>,
    state: RwLock<OrchestratorState>,
    emergency: AtomicBool,
    modules: RwLock<BTreeMap<String, bool>>,
    monitoring: Mutex<Option<Monitoring>>,
    shutdown: CancellationToken,
}

/// Owns every dashboard service, the monitoring loops and the event handlers.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        settings: AppSettings,
        storage: Arc<dyn KeyValueStore>,
        rng: Arc<dyn RandomSource>,
    ) -> PoResult<Self> {
        Self::assemble(settings, storage, rng, None)
    }

    /// Builds every service; `panes` replaces the UI refresher as the tab content source.
    fn assemble(
        settings: AppSettings,
        storage: Arc<dyn KeyValueStore>,
        rng: Arc<dyn RandomSource>,
        panes: Option<Arc<dyn PaneSource>>,
    ) -> PoResult<Self> {
        let bus = EventBus::new();
        let pacing = settings.simulation.pacing;
        let data = Arc::new(
            DataStore::new(storage.clone(), settings.data.storage_key.clone())
                .with_auto_save(settings.data.auto_save),
        );
        let prediction = Arc::new(PredictionService::new(settings.ml.clone(), pacing, rng.clone())?);
        let simulator = Arc::new(ScenarioSimulator::new(
            &settings.simulation,
            storage.clone(),
            bus.clone(),
            rng.clone(),
        ));
        let notifications = NotificationCenter::new(storage.clone(), bus.clone());
        let map = Arc::new(MapPresentation::new(settings.map.clone(), rng.clone()));
        let ui = Arc::new(UiRefresher::new(UiParts {
            settings: settings.clone(),
            data: data.clone(),
            simulator: simulator.clone(),
            prediction: prediction.clone(),
            notifications: notifications.clone(),
            map: map.clone(),
            bus: bus.clone(),
            rng: rng.clone(),
        })?);
        let panes: Arc<dyn PaneSource> = panes.unwrap_or_else(|| ui.clone());
        let tabs = TabRouter::new(storage.clone(), bus.clone(), panes);

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                storage,
                bus,
                rng,
                data,
                prediction,
                simulator,
                tabs,
                map,
                notifications,
                ui,
                state: RwLock::new(OrchestratorState::Uninitialized),
                emergency: AtomicBool::new(false),
                modules: RwLock::new(BTreeMap::new()),
                monitoring: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn settings(&self) -> &AppSettings {
        &self.inner.settings
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn data(&self) -> &Arc<DataStore> {
        &self.inner.data
    }

    pub fn simulator(&self) -> &Arc<ScenarioSimulator> {
        &self.inner.simulator
    }

    pub fn prediction(&self) -> &Arc<PredictionService> {
        &self.inner.prediction
    }

    pub fn tabs(&self) -> &TabRouter {
        &self.inner.tabs
    }

    pub fn map(&self) -> &Arc<MapPresentation> {
        &self.inner.map
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.inner.notifications
    }

    pub fn ui(&self) -> &Arc<UiRefresher> {
        &self.inner.ui
    }

    pub fn is_emergency(&self) -> bool {
        self.inner.emergency.load(Ordering::SeqCst)
    }

    /// Brings every module up in order, wires the event handlers and starts
    /// monitoring. Calling it again returns the current state.
    pub async fn init(&self) -> OrchestratorState {
        {
            let mut state = self.inner.state.write().await;
            if *state != OrchestratorState::Uninitialized {
                return *state;
            }
            *state = OrchestratorState::Initializing;
        }
        tracing::info!(
            app = %self.inner.settings.app.name,
            version = %self.inner.settings.app.version,
            "initializing prevention orchestrator"
        );

        for module in Module::ORDER {
            let ready = match self.init_module(module).await {
                Ok(()) => {
                    tracing::info!(module = module.name(), "module initialized");
                    true
                }
                Err(err) => {
                    tracing::error!(module = module.name(), error = %err, "module failed to initialize");
                    false
                }
            };
            self.inner
                .modules
                .write()
                .await
                .insert(module.name().to_string(), ready);
        }

        let events = self.inner.bus.subscribe();
        self.spawn_event_handler(events);

        let restored = self.load_state().await.is_some_and(|record| record.emergency_mode);
        if restored {
            self.inner.emergency.store(true, Ordering::SeqCst);
            self.inner.ui.set_emergency(true);
        }
        self.start_monitoring().await;
        self.update_dashboard().await;

        let data_ready = self
            .inner
            .modules
            .read()
            .await
            .get(Module::Data.name())
            .copied()
            .unwrap_or(false);
        let state = if data_ready {
            OrchestratorState::Ready
        } else {
            OrchestratorState::Error
        };
        *self.inner.state.write().await = state;

        if state == OrchestratorState::Ready {
            tracing::info!(emergency = restored, "prevention orchestrator ready");
            let this = self.clone();
            self.spawn_delayed(WELCOME_DELAY_MS, async move {
                this.notify(
                    NotificationLevel::Success,
                    "System Ready",
                    "System initialized and ready. Monitoring active.",
                )
                .await;
            });
        } else {
            self.notify(
                NotificationLevel::Error,
                "System Error",
                "Initialization failed: data store unavailable",
            )
            .await;
        }
        state
    }

    async fn init_module(&self, module: Module) -> PoResult<()> {
        let inner = &self.inner;
        match module {
            Module::Data => inner.data.init().await?,
            Module::Prediction => {
                if inner.settings.ml.enabled {
                    inner.prediction.init().await;
                }
            }
            Module::Simulation => inner.simulator.init().await,
            Module::Tabs => {
                inner.tabs.init().await?;
            }
            Module::Map => {
                let snapshot = inner.data.snapshot().await;
                inner.map.init(&snapshot.alerts, &snapshot.resources).await;
            }
            Module::Notifications => inner.notifications.init().await,
            Module::Ui => inner.ui.init().await,
        }
        Ok(())
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let loops = self
            .inner
            .monitoring
            .lock()
            .await
            .as_ref()
            .map_or(0, |monitoring| monitoring.loops);
        OrchestratorStatus {
            state: *self.inner.state.read().await,
            emergency_mode: self.is_emergency(),
            modules: self.inner.modules.read().await.clone(),
            loops,
            current_tab: self.inner.tabs.current().await,
            config: self.inner.settings.clone(),
        }
    }

    /// Stops the loops and pending delayed work, then saves session state.
    pub async fn shutdown(&self) {
        self.save_state().await;
        self.inner.shutdown.cancel();
        self.inner.monitoring.lock().await.take();
        tracing::info!("prevention orchestrator stopped");
    }

    // Monitoring

    async fn start_monitoring(&self) {
        let cadence = if self.is_emergency() {
            self.inner.settings.monitoring.emergency.clone()
        } else {
            self.inner.settings.monitoring.normal.clone()
        };

        let mut monitoring = self.inner.monitoring.lock().await;
        if let Some(previous) = monitoring.take() {
            previous.cancel.cancel();
        }
        let cancel = self.inner.shutdown.child_token();
        let mut loops = 0;

        let refresh_jitters = cadence.stats_ms.is_none();
        let this = self.clone();
        spawn_ticker(cancel.clone(), cadence.refresh_interval(), move || {
            let this = this.clone();
            async move {
                if refresh_jitters {
                    this.update_system_stats().await;
                } else {
                    this.update_dashboard().await;
                }
            }
        });
        loops += 1;

        if let Some(stats_ms) = cadence.stats_ms {
            let this = self.clone();
            spawn_ticker(cancel.clone(), Duration::from_millis(stats_ms.max(1)), move || {
                let this = this.clone();
                async move { this.update_system_stats().await }
            });
            loops += 1;
        }

        let alert_period = self.alert_period(&cadence);
        let probability = cadence.alert_probability;
        let this = self.clone();
        spawn_ticker(cancel.clone(), alert_period, move || {
            let this = this.clone();
            async move { this.maybe_inject_alert(probability).await }
        });
        loops += 1;

        tracing::info!(
            loops,
            refresh_ms = cadence.refresh_ms,
            alert_period_ms = alert_period.as_millis() as u64,
            emergency = self.is_emergency(),
            "monitoring started"
        );
        *monitoring = Some(Monitoring { cancel, loops });
    }

    fn alert_period(&self, cadence: &Cadence) -> Duration {
        let low = cadence.alert_min_ms as f64;
        let high = cadence.alert_max_ms.max(cadence.alert_min_ms) as f64;
        Duration::from_millis((self.inner.rng.range(low, high) as u64).max(1))
    }

    async fn maybe_inject_alert(&self, probability: f64) {
        if !self.inner.settings.simulation.enabled || !self.inner.rng.chance(probability) {
            return;
        }
        let active = self.inner.data.active_alerts().await.len();
        if active >= self.inner.settings.simulation.max_alerts {
            tracing::debug!(active, "alert injection skipped at capacity");
            return;
        }
        self.simulate_new_trigger().await;
    }

    async fn update_dashboard(&self) {
        self.inner.ui.refresh().await;
        self.inner.tabs.invalidate_all().await;
    }

    async fn update_system_stats(&self) {
        self.inner
            .data
            .jitter_response_time(self.inner.rng.as_ref())
            .await;
        self.update_dashboard().await;
    }

    /// Switches cadence and announces the new mode. `None` flips the current mode.
    pub async fn toggle_emergency_mode(&self, enabled: Option<bool>) -> bool {
        let enabled = enabled.unwrap_or(!self.is_emergency());
        self.inner.emergency.store(enabled, Ordering::SeqCst);
        self.inner.ui.set_emergency(enabled);

        if enabled {
            tracing::warn!("emergency mode activated");
            self.notify(
                NotificationLevel::Warning,
                "Emergency Mode Activated",
                "Emergency protocols activated. All systems at maximum alert.",
            )
            .await;
        } else {
            tracing::info!("emergency mode deactivated");
            self.notify(
                NotificationLevel::Success,
                "Emergency Mode Deactivated",
                "Emergency mode deactivated. Returning to normal operations.",
            )
            .await;
        }

        self.start_monitoring().await;
        self.inner
            .bus
            .publish(SOURCE, DashboardEvent::EmergencyMode { enabled });
        self.save_state().await;
        enabled
    }

    // Event handling

    fn spawn_event_handler(&self, mut events: EventSubscriber) {
        let this = self.clone();
        let cancel = self.inner.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    () = cancel.cancelled() => break,
                    envelope = events.recv() => envelope,
                };
                let Some(envelope) = envelope else {
                    break;
                };
                match envelope.event {
                    DashboardEvent::NewAlert(alert) => this.handle_new_alert(alert).await,
                    DashboardEvent::SimulationComplete(result) => {
                        this.handle_simulation_complete(result).await;
                    }
                    DashboardEvent::EmergencyMode { enabled } => this.inner.ui.set_emergency(enabled),
                    _ => {}
                }
            }
            tracing::debug!("event handler stopped");
        });
    }

    async fn handle_new_alert(&self, alert: Alert) {
        tracing::info!(alert_id = %alert.id, alert_type = %alert.alert_type, "handling new alert");
        self.inner.tabs.invalidate(Tab::Alerts).await;
        self.inner.tabs.invalidate(Tab::Dashboard).await;

        if self.is_emergency() && alert.severity == Severity::High {
            let this = self.clone();
            self.spawn_delayed(ESCALATION_DELAY_MS, async move {
                if let Err(err) = this.escalate_alert(&alert.id).await {
                    tracing::warn!(alert_id = %alert.id, error = %err, "auto-escalation failed");
                }
            });
        }
    }

    async fn handle_simulation_complete(&self, result: SimulationResult) {
        tracing::info!(scenario = %result.scenario, accuracy = result.accuracy, "simulation complete");
        if result.accuracy <= PLAYBOOK_ACCURACY_FLOOR {
            return;
        }
        let improvement = (result.accuracy - PLAYBOOK_ACCURACY_FLOOR) * PLAYBOOK_GAIN;
        self.inner.data.nudge_playbook(improvement).await;
        self.inner.tabs.invalidate(Tab::Playbook).await;
        self.notify(
            NotificationLevel::Success,
            "Playbook Enhanced",
            format!("AI playbook improved by {improvement:.1}%"),
        )
        .await;
    }

    // Commands

    pub async fn simulate_new_trigger(&self) -> Alert {
        let alert = self
            .inner
            .data
            .simulate_random_alert(self.inner.rng.as_ref())
            .await;
        self.inner.notifications.show_alert(&alert).await;
        if self.inner.map.is_initialized().await {
            self.inner.map.add_alert_marker(&alert).await;
        }
        tracing::info!(
            alert_type = %alert.alert_type,
            location = %alert.location,
            severity = alert.severity.as_str(),
            "new alert simulated"
        );
        self.inner
            .bus
            .publish(SOURCE, DashboardEvent::NewAlert(alert.clone()));
        alert
    }

    pub async fn escalate_alert(&self, id: &AlertId) -> PoResult<Alert> {
        let alert = self
            .inner
            .data
            .escalate_alert(id)
            .await
            .ok_or_else(|| PoError::not_found(format!("alert not found: {id}")))?;
        self.after_alert_change(&alert).await;
        self.notify_for(
            NotificationLevel::Warning,
            "Alert Escalated",
            format!("Alert {id} escalated to {} severity", alert.severity),
            4_000,
        )
        .await;
        Ok(alert)
    }

    pub async fn acknowledge_alert(&self, id: &AlertId) -> PoResult<Alert> {
        let alert = self
            .inner
            .data
            .acknowledge_alert(id)
            .await
            .ok_or_else(|| PoError::not_found(format!("alert not found: {id}")))?;
        self.after_alert_change(&alert).await;
        self.notify_for(
            NotificationLevel::Success,
            "Alert Acknowledged",
            "Alert has been marked as acknowledged",
            3_000,
        )
        .await;
        Ok(alert)
    }

    pub async fn acknowledge_all(&self) -> usize {
        let count = self.inner.data.acknowledge_all().await;
        self.update_dashboard().await;
        self.notify_for(
            NotificationLevel::Success,
            "All Alerts Acknowledged",
            format!("{count} alerts have been acknowledged"),
            3_000,
        )
        .await;
        count
    }

    pub async fn clear_resolved(&self) -> usize {
        let count = self.inner.data.clear_resolved().await;
        self.update_dashboard().await;
        self.notify_for(
            NotificationLevel::Info,
            "Alerts Cleared",
            format!("{count} resolved alerts have been cleared"),
            3_000,
        )
        .await;
        count
    }

    async fn after_alert_change(&self, alert: &Alert) {
        self.inner
            .bus
            .publish(SOURCE, DashboardEvent::AlertUpdated(alert.clone()));
        self.update_dashboard().await;
    }

    pub async fn run_scenario(&self, key: &str) -> PoResult<SimulationResult> {
        match self.inner.simulator.run_scenario(key).await {
            Ok(result) => {
                self.inner.tabs.invalidate(Tab::Simulation).await;
                self.notify(
                    NotificationLevel::Success,
                    "Simulation Complete",
                    format!("{}: Risk reduction {}", result.scenario, result.risk_reduction_label),
                )
                .await;
                Ok(result)
            }
            Err(err) => {
                tracing::error!(scenario = key, error = %err, "scenario failed");
                self.notify(NotificationLevel::Error, "Scenario Failed", err.message.clone())
                    .await;
                Err(err)
            }
        }
    }

    pub async fn run_all_scenarios(&self) -> BatchReport {
        let report = self.inner.simulator.run_all_scenarios().await;
        self.inner.tabs.invalidate(Tab::Simulation).await;
        let level = if report.summary.failed == 0 {
            NotificationLevel::Success
        } else {
            NotificationLevel::Warning
        };
        self.notify(
            level,
            "Simulations Complete",
            format!(
                "{}/{} scenarios completed, average risk reduction {}",
                report.summary.successful, report.summary.total, report.summary.average_risk_reduction
            ),
        )
        .await;
        report
    }

    pub async fn clear_simulation_history(&self) {
        self.inner.simulator.clear_history().await;
        self.inner.tabs.invalidate(Tab::Simulation).await;
    }

    pub async fn train_playbook(&self) -> PoResult<TrainingReport> {
        let samples: Vec<TrainingSample> = self
            .inner
            .data
            .alerts()
            .await
            .iter()
            .map(training_sample)
            .collect();

        match self.inner.prediction.train(&samples).await {
            Ok(report) => {
                self.inner.data.mark_trained(now_epoch_millis()).await;
                self.update_dashboard().await;
                self.notify(
                    NotificationLevel::Success,
                    "AI Training Complete",
                    format!("Training complete. New accuracy: {:.1}%", report.accuracy * 100.0),
                )
                .await;
                Ok(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "playbook training failed");
                self.notify(NotificationLevel::Error, "Training Failed", err.message.clone())
                    .await;
                Err(err)
            }
        }
    }

    pub async fn reset_playbook(&self) -> Playbook {
        let playbook = self
            .inner
            .data
            .replace_playbook(Playbook::baseline(now_epoch_millis()))
            .await;
        self.update_dashboard().await;
        self.notify(
            NotificationLevel::Info,
            "Playbook Reset",
            "AI playbook has been reset to baseline",
        )
        .await;
        playbook
    }

    /// Moves up to three ready resources to deploying; each goes on duty after
    /// the deployment delay.
    pub async fn deploy_resources(&self) -> PoResult<usize> {
        let ready: Vec<Resource> = self
            .inner
            .data
            .resources()
            .await
            .into_iter()
            .filter(|resource| resource.status.is_deployable())
            .take(DEPLOYMENT_BATCH)
            .collect();

        if ready.is_empty() {
            let err = PoError::new(ErrorCode::Unavailable, "No available resources to deploy");
            self.notify(NotificationLevel::Error, "Deployment Failed", err.message.clone())
                .await;
            return Err(err);
        }

        for resource in &ready {
            self.set_resource_status(&resource.id, ResourceStatus::Deploying)
                .await;
            let this = self.clone();
            let resource = resource.clone();
            self.spawn_delayed(DEPLOYMENT_DELAY_MS, async move {
                this.set_resource_status(&resource.id, ResourceStatus::OnDuty)
                    .await;
                this.notify(
                    NotificationLevel::Success,
                    "Resource Deployed",
                    format!("{} deployed successfully", resource.name),
                )
                .await;
            });
        }

        tracing::info!(count = ready.len(), "deploying resources");
        self.notify(
            NotificationLevel::Info,
            "Deployment Started",
            format!("Deploying {} resources...", ready.len()),
        )
        .await;
        self.update_dashboard().await;
        Ok(ready.len())
    }

    async fn set_resource_status(&self, id: &ResourceId, status: ResourceStatus) {
        if let Some(updated) = self
            .inner
            .data
            .update_resource(id, ResourcePatch::status(status))
            .await
        {
            self.inner
                .bus
                .publish(SOURCE, DashboardEvent::ResourceUpdated(updated));
        }
    }

    pub async fn select_resource(&self, id: &ResourceId) -> PoResult<Resource> {
        let resource = self
            .inner
            .data
            .find_resource(id)
            .await
            .ok_or_else(|| PoError::not_found(format!("resource not found: {id}")))?;
        self.notify(
            NotificationLevel::Info,
            "Resource Selected",
            format!("Selected {} - Status: {}", resource.name, resource.status),
        )
        .await;
        Ok(resource)
    }

    /// Scores current load with the prediction service and reports its advice.
    pub async fn optimize_allocation(&self) -> Prediction {
        let snapshot = self.inner.data.snapshot().await;
        let features = allocation_features(&snapshot.alerts, &snapshot.resources);
        let prediction = self.inner.prediction.predict(&features).await;
        tracing::info!(
            risk = prediction.risk_level,
            recommendations = prediction.recommendations.len(),
            "allocation optimized"
        );
        self.notify(
            NotificationLevel::Success,
            "Resource Optimization",
            format!(
                "AI optimization complete. {} recommendations generated.",
                prediction.recommendations.len()
            ),
        )
        .await;
        prediction
    }

    pub async fn export_data(&self) -> PoResult<ExportFile> {
        let history = self.inner.simulator.history().await;
        let bundle = self
            .inner
            .data
            .export_bundle(&history, &self.inner.settings.app.version)
            .await;
        match serde_json::to_string_pretty(&bundle) {
            Ok(body) => {
                self.notify(
                    NotificationLevel::Success,
                    "Export Complete",
                    "Impact data exported successfully",
                )
                .await;
                Ok(ExportFile {
                    filename: format!(
                        "prevention-orchestrator-export-{}.json",
                        date_label(bundle.export_date_ms)
                    ),
                    body,
                })
            }
            Err(err) => {
                let err = PoError::new(ErrorCode::Internal, err.to_string());
                self.notify(NotificationLevel::Error, "Export Failed", err.message.clone())
                    .await;
                Err(err)
            }
        }
    }

    pub async fn refresh_dashboard(&self) {
        self.inner.data.recalculate_metrics().await;
        self.update_dashboard().await;
        let snapshot = self.inner.data.snapshot().await;
        self.inner
            .map
            .refresh(&snapshot.alerts, &snapshot.resources)
            .await;
        self.notify(
            NotificationLevel::Success,
            "Refresh Complete",
            "Dashboard refreshed with latest data",
        )
        .await;
    }

    pub async fn update_chart(&self, period: &str) -> ImpactChart {
        let chart = self.inner.ui.update_chart(period).await;
        self.inner.tabs.invalidate(Tab::Dashboard).await;
        self.notify(
            NotificationLevel::Success,
            "Chart Updated",
            format!("Chart updated for {} period", chart.period),
        )
        .await;
        chart
    }

    pub async fn switch_tab(&self, tab_id: &str) -> PoResult<TabView> {
        self.inner.tabs.switch_to(tab_id).await
    }

    pub async fn toggle_traffic(&self) -> bool {
        self.inner.map.toggle_traffic().await
    }

    pub async fn toggle_layer(&self, layer: &str) -> PoResult<bool> {
        let kind = LayerKind::parse(layer)
            .ok_or_else(|| PoError::not_found(format!("map layer not found: {layer}")))?;
        Ok(self.inner.map.toggle_layer(kind).await)
    }

    pub async fn zoom_to_city(&self, city: &str) -> MapView {
        self.inner.map.zoom_to_city(city).await
    }

    pub async fn dismiss_notification(&self, id: &NotificationId) {
        self.inner.notifications.dismiss(id).await;
    }

    /// Clears the persisted session.
    pub async fn logout(&self) {
        if let Err(err) = self.inner.storage.remove(APP_STATE_KEY).await {
            tracing::warn!(error = %err, "could not clear session state");
        }
        tracing::info!("logged out");
    }

    // State

    pub async fn save_state(&self) {
        let record = AppStateRecord {
            emergency_mode: self.is_emergency(),
            last_active_ms: now_epoch_millis(),
            module_status: self.inner.modules.read().await.clone(),
        };
        if persist_best_effort(self.inner.storage.as_ref(), APP_STATE_KEY, &record).await {
            tracing::debug!("application state saved");
        }
    }

    pub async fn load_state(&self) -> Option<AppStateRecord> {
        match load_json::<AppStateRecord>(self.inner.storage.as_ref(), APP_STATE_KEY).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "could not load application state");
                None
            }
        }
    }

    // Helpers

    async fn notify(
        &self,
        level: NotificationLevel,
        title: &str,
        message: impl Into<String>,
    ) -> NotificationId {
        self.inner
            .notifications
            .show(ToastRequest::new(level, title, message))
            .await
    }

    async fn notify_for(
        &self,
        level: NotificationLevel,
        title: &str,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> NotificationId {
        self.inner
            .notifications
            .show(ToastRequest::new(level, title, message).duration_ms(duration_ms))
            .await
    }

    /// Runs `task` after `millis` (scaled by pacing) unless shut down first.
    fn spawn_delayed<F>(&self, millis: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = Duration::from_millis((millis as f64 * self.inner.settings.simulation.pacing) as u64);
        let cancel = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => task.await,
            }
        });
    }
}

fn spawn_ticker<F, Fut>(cancel: CancellationToken, period: Duration, mut tick: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => tick().await,
            }
        }
    });
}

fn training_sample(alert: &Alert) -> TrainingSample {
    TrainingSample {
        features: RiskFeatures {
            location_type: location_type(&alert.location).map(str::to_string),
            ..RiskFeatures::default()
        },
        severity: alert.severity,
    }
}

fn location_type(location: &str) -> Option<&'static str> {
    if location.contains("Highway") || location.contains("M1") || location.contains("N1") {
        Some("highway")
    } else if location.contains("Intersection") || location.contains("Junction") {
        Some("intersection")
    } else if location.contains("School") {
        Some("school_zone")
    } else {
        None
    }
}

fn allocation_features(alerts: &[Alert], resources: &[Resource]) -> RiskFeatures {
    let active = alerts.iter().filter(|alert| alert.is_active()).count();
    let severe = alerts
        .iter()
        .filter(|alert| alert.severity >= Severity::High)
        .count();
    let ready = resources
        .iter()
        .filter(|resource| resource.status.is_deployable())
        .count();
    RiskFeatures {
        traffic_density: Some((active as f64 * 10.0).min(100.0)),
        historical_accidents: Some(severe as f64),
        vehicle_count: Some(ready as u32),
        ..RiskFeatures::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use po_core::{AlertStatus, ExpectedOutcomes, FixedRandom, NewAlert, ProtocolId, ScenarioParameters};
    use po_storage::MemoryStore;

    struct BrokenPanes;

    #[async_trait]
    impl PaneSource for BrokenPanes {
        async fn render_pane(&self, tab: Tab) -> PoResult<String> {
            Err(PoError::new(ErrorCode::Internal, format!("{tab:?} pane unavailable")))
        }
    }

    fn settings(pacing: f64) -> AppSettings {
        let mut settings = AppSettings::for_tests();
        settings.simulation.pacing = pacing;
        settings.simulation.enabled = true;
        settings.simulation.max_alerts = 50;
        settings.ml.enabled = true;
        settings.data.auto_save = true;
        settings
    }

    fn orchestrator(pacing: f64, random: f64) -> (Orchestrator, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::new(
            settings(pacing),
            storage.clone(),
            Arc::new(FixedRandom::constant(random)),
        )
        .expect("orchestrator");
        (orchestrator, storage)
    }

    async fn high_alert(orchestrator: &Orchestrator) -> Alert {
        let alert = orchestrator
            .data()
            .add_alert(NewAlert {
                alert_type: "Congestion Build-up".into(),
                protocol: ProtocolId::from("CG-002"),
                location: "M1 Highway, KM 4.0".into(),
                severity: Severity::High,
                confidence: 0.9,
                description: "Queue forming".into(),
            })
            .await;
        orchestrator
            .bus()
            .publish("test", DashboardEvent::NewAlert(alert.clone()));
        alert
    }

    fn result_with_accuracy(accuracy: f64) -> SimulationResult {
        SimulationResult {
            scenario_key: "rush_hour".into(),
            scenario: "Rush Hour".into(),
            risk_reduction: 0.7,
            risk_reduction_label: "70.0%".into(),
            response_time_s: 6.0,
            response_time_label: "6.0s".into(),
            accuracy,
            recommendations: Vec::new(),
            parameters: ScenarioParameters::default(),
            expected_outcomes: ExpectedOutcomes {
                risk_reduction: "65-75%".into(),
                response_time: "6-8s".into(),
                protocol_effectiveness: "85-90%".into(),
            },
            processing_time_ms: 0,
            timestamp_ms: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn init_brings_every_module_up() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        assert_eq!(orchestrator.init().await, OrchestratorState::Ready);

        let status = orchestrator.status().await;
        assert_eq!(status.modules.len(), Module::ORDER.len());
        assert!(status.modules.values().all(|ready| *ready));
        assert_eq!(status.loops, 3);
        assert_eq!(status.current_tab, Tab::Dashboard);
        assert_eq!(orchestrator.init().await, OrchestratorState::Ready);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let history = orchestrator.notifications().history().await;
        assert!(history.iter().any(|note| note.title == "System Ready"));
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tabs_module_leaves_the_rest_running() {
        let storage = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::assemble(
            settings(0.0),
            storage,
            Arc::new(FixedRandom::constant(0.5)),
            Some(Arc::new(BrokenPanes)),
        )
        .expect("orchestrator");
        assert_eq!(orchestrator.init().await, OrchestratorState::Ready);

        let status = orchestrator.status().await;
        assert_eq!(status.modules.get("tabs"), Some(&false));
        for module in ["data", "map", "notifications", "ui"] {
            assert_eq!(status.modules.get(module), Some(&true), "{module}");
        }
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_data_store_puts_the_dashboard_in_error() {
        let (orchestrator, storage) = orchestrator(0.0, 0.5);
        storage.fail_reads(true);
        assert_eq!(orchestrator.init().await, OrchestratorState::Error);

        let status = orchestrator.status().await;
        assert_eq!(status.modules.get("data"), Some(&false));
        let history = orchestrator.notifications().history().await;
        assert!(history.iter().any(|note| note.title == "System Error"));
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_mode_auto_escalates_high_alerts() {
        let (orchestrator, _storage) = orchestrator(1.0, 0.5);
        orchestrator.init().await;
        assert!(orchestrator.toggle_emergency_mode(Some(true)).await);

        let alert = high_alert(&orchestrator).await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let pending = orchestrator.data().find_alert(&alert.id).await.expect("alert");
        assert_eq!(pending.severity, Severity::High);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let escalated = orchestrator.data().find_alert(&alert.id).await.expect("alert");
        assert_eq!(escalated.severity, Severity::Critical);
        assert_eq!(escalated.status, AlertStatus::Escalated);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn normal_mode_leaves_high_alerts_alone() {
        let (orchestrator, _storage) = orchestrator(1.0, 0.5);
        orchestrator.init().await;
        let alert = high_alert(&orchestrator).await;
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let unchanged = orchestrator.data().find_alert(&alert.id).await.expect("alert");
        assert_eq!(unchanged.severity, Severity::High);
        assert_eq!(unchanged.status, AlertStatus::Active);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn accurate_simulations_improve_the_playbook() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        let before = orchestrator.data().playbook().await.effectiveness;

        orchestrator
            .bus()
            .publish("test", DashboardEvent::SimulationComplete(result_with_accuracy(0.96)));
        orchestrator
            .bus()
            .publish("test", DashboardEvent::SimulationComplete(result_with_accuracy(0.85)));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let after = orchestrator.data().playbook().await.effectiveness;
        assert!((after - before - 0.03).abs() < 1e-9);
        let history = orchestrator.notifications().history().await;
        assert_eq!(
            history.iter().filter(|note| note.title == "Playbook Enhanced").count(),
            1
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_toggle_persists_and_restores_cadence() {
        let (orchestrator, storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        let mut events = orchestrator.bus().subscribe();

        assert!(orchestrator.toggle_emergency_mode(None).await);
        assert_eq!(orchestrator.status().await.loops, 2);
        let saved: AppStateRecord = load_json(storage.as_ref(), APP_STATE_KEY)
            .await
            .expect("load")
            .expect("record");
        assert!(saved.emergency_mode);
        assert!(
            events
                .drain()
                .iter()
                .any(|envelope| envelope.event == DashboardEvent::EmergencyMode { enabled: true })
        );

        assert!(!orchestrator.toggle_emergency_mode(None).await);
        assert_eq!(orchestrator.status().await.loops, 3);
        assert!(!orchestrator.ui().is_emergency());
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn injection_loop_adds_alerts_when_the_draw_succeeds() {
        // 0.1 draws a 33 s injection period and always passes the 0.3 chance.
        let (orchestrator, _storage) = orchestrator(0.0, 0.1);
        orchestrator.init().await;
        let before = orchestrator.data().alerts().await.len();

        tokio::time::sleep(Duration::from_millis(32_000)).await;
        assert_eq!(orchestrator.data().alerts().await.len(), before);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(orchestrator.data().alerts().await.len(), before + 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_moves_three_resources_on_duty() {
        let (orchestrator, _storage) = orchestrator(1.0, 0.5);
        orchestrator.init().await;

        assert_eq!(orchestrator.deploy_resources().await.expect("deploy"), 3);
        let ids = ["res-001", "res-002", "res-003"].map(ResourceId::from);
        for id in &ids {
            let resource = orchestrator.data().find_resource(id).await.expect("resource");
            assert_eq!(resource.status, ResourceStatus::Deploying);
        }

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        for id in &ids {
            let resource = orchestrator.data().find_resource(id).await.expect("resource");
            assert_eq!(resource.status, ResourceStatus::OnDuty);
        }
        let untouched = orchestrator
            .data()
            .find_resource(&ResourceId::from("res-005"))
            .await
            .expect("resource");
        assert_eq!(untouched.status, ResourceStatus::Active);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_without_ready_resources_fails() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        for resource in orchestrator.data().resources().await {
            orchestrator
                .data()
                .update_resource(&resource.id, ResourcePatch::status(ResourceStatus::Maintenance))
                .await;
        }

        let err = orchestrator.deploy_resources().await.expect_err("nothing ready");
        assert_eq!(err.code, ErrorCode::Unavailable);
        assert_eq!(err.message, "No available resources to deploy");
        let history = orchestrator.notifications().history().await;
        assert!(history.iter().any(|note| note.title == "Deployment Failed"));
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_scenario_reports_failure() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        let err = orchestrator
            .run_scenario("hurricane")
            .await
            .expect_err("unknown");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(orchestrator.simulator().history().await.is_empty());
        let history = orchestrator.notifications().history().await;
        assert!(history.iter().any(|note| note.title == "Scenario Failed"));
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn escalating_unknown_alert_is_not_found() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        let err = orchestrator
            .escalate_alert(&AlertId::from("alert-missing"))
            .await
            .expect_err("missing");
        assert_eq!(err.code, ErrorCode::NotFound);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn training_stamps_the_playbook() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        let report = orchestrator.train_playbook().await.expect("train");
        assert_eq!(report.samples_processed, 5);
        assert!(report.accuracy <= 0.98);

        let reset = orchestrator.reset_playbook().await;
        assert_eq!(reset.effectiveness, Playbook::BASELINE_EFFECTIVENESS);
        assert_eq!(reset.scenarios_tested, 0);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn export_bundles_current_data() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        orchestrator.run_scenario("rush_hour").await.expect("run");

        let export = orchestrator.export_data().await.expect("export");
        assert!(export.filename.starts_with("prevention-orchestrator-export-"));
        assert!(export.filename.ends_with(".json"));
        let value: serde_json::Value = serde_json::from_str(&export.body).expect("json");
        assert_eq!(value["alerts"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["simulations"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["system_version"], orchestrator.settings().app.version.as_str());
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn logout_clears_session_state() {
        let (orchestrator, storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        orchestrator.save_state().await;
        assert!(storage.keys().await.contains(&APP_STATE_KEY.to_string()));

        orchestrator.logout().await;
        assert!(!storage.keys().await.contains(&APP_STATE_KEY.to_string()));
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_trigger_notifies_and_marks_map() {
        let (orchestrator, _storage) = orchestrator(0.0, 0.5);
        orchestrator.init().await;
        let mut events = orchestrator.bus().subscribe();
        let before = orchestrator.map().snapshot().await.alerts.len();

        let alert = orchestrator.simulate_new_trigger().await;
        assert_eq!(orchestrator.map().snapshot().await.alerts.len(), before + 1);
        let history = orchestrator.notifications().history().await;
        assert!(history.iter().any(|note| note.title == "New Alert Detected"));
        assert!(
            events
                .drain()
                .iter()
                .any(|envelope| envelope.event == DashboardEvent::NewAlert(alert.clone()))
        );
        orchestrator.shutdown().await;
    }

    #[test]
    fn training_samples_classify_locations() {
        assert_eq!(location_type("M1 Highway, KM 12.4"), Some("highway"));
        assert_eq!(location_type("CBD Intersection 3"), Some("intersection"));
        assert_eq!(location_type("School Zone B"), Some("school_zone"));
        assert_eq!(location_type("Zone 1"), None);
    }
}
