use async_trait::async_trait;
use po_config::AppSettings;
use po_core::{
    Alert, AlertStatus, Notification, PoError, PoResult, Protocol, RandomSource, Resource,
    Severity, SimulationResult, clock_label, date_label, now_epoch_millis,
};
use po_data::DataStore;
use po_messaging::{DashboardEvent, EventBus};
use po_notify::NotificationCenter;
use po_prediction::{PredictionService, PredictionStatus};
use po_simulation::ScenarioSimulator;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::map::{MapPresentation, MapStats, severity_color, status_color};
use crate::render::PaneRenderer;
use crate::tabs::{MenuEntry, PaneSource, Tab, TabView};

const SOURCE: &str = "ui";
const RECENT_ALERTS: usize = 5;
const HISTORY_ROWS: usize = 10;
const REVIEW_THRESHOLD: f64 = 80.0;
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStats {
    pub active_triggers: usize,
    pub response_time: String,
    pub uptime: String,
    pub available_resources: usize,
    pub total_resources: usize,
    pub ai_effectiveness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCard {
    #[serde(flatten)]
    pub alert: Alert,
    pub color: &'static str,
    pub confidence_label: String,
}

impl AlertCard {
    fn from_alert(alert: &Alert) -> Self {
        Self {
            alert: alert.clone(),
            color: severity_color(alert.severity),
            confidence_label: format!("{:.0}%", alert.confidence * 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub active: usize,
    pub escalated: usize,
    pub critical: usize,
}

impl AlertSummary {
    fn from_alerts(alerts: &[Alert]) -> Self {
        Self {
            total: alerts.len(),
            active: alerts.iter().filter(|alert| alert.is_active()).count(),
            escalated: alerts
                .iter()
                .filter(|alert| alert.status == AlertStatus::Escalated)
                .count(),
            critical: alerts
                .iter()
                .filter(|alert| alert.severity == Severity::Critical)
                .count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCard {
    #[serde(flatten)]
    pub resource: Resource,
    pub icon: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolRow {
    #[serde(flatten)]
    pub protocol: Protocol,
    pub effectiveness_label: String,
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactMetrics {
    pub accidents_prevented: u32,
    pub lives_saved: String,
    pub economic_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub label: &'static str,
    pub data: Vec<u32>,
    pub border_color: &'static str,
    pub background_color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactChart {
    pub period: String,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartSeries>,
}

impl ImpactChart {
    /// Weekly figures shown until a period is selected.
    pub fn weekly() -> Self {
        Self::from_series(
            "7d",
            labels_for("7d", 7),
            vec![12, 19, 8, 15, 22, 18, 24],
            vec![65, 59, 80, 81, 56, 55, 40],
        )
    }

    /// Synthetic series for `24h`, `7d` or anything else (30 days).
    pub fn for_period(period: &str, rng: &dyn RandomSource) -> Self {
        let points = match period {
            "24h" => 24,
            "7d" => 7,
            _ => 30,
        };
        let accidents = (0..points)
            .map(|_| (rng.next_f64() * 30.0).floor() as u32 + 10)
            .collect();
        let risk = (0..points)
            .map(|_| (rng.next_f64() * 50.0).floor() as u32 + 30)
            .collect();
        Self::from_series(period, labels_for(period, points), accidents, risk)
    }

    fn from_series(period: &str, labels: Vec<String>, accidents: Vec<u32>, risk: Vec<u32>) -> Self {
        Self {
            period: period.to_string(),
            labels,
            datasets: vec![
                ChartSeries {
                    label: "Accidents Prevented",
                    data: accidents,
                    border_color: "rgb(59, 130, 246)",
                    background_color: "rgba(59, 130, 246, 0.1)",
                },
                ChartSeries {
                    label: "Risk Level",
                    data: risk,
                    border_color: "rgb(239, 68, 68)",
                    background_color: "rgba(239, 68, 68, 0.1)",
                },
            ],
        }
    }
}

fn labels_for(period: &str, points: usize) -> Vec<String> {
    match period {
        "24h" => (0..points).map(|hour| format!("{hour:02}:00")).collect(),
        "7d" => WEEKDAYS.iter().map(|day| day.to_string()).collect(),
        _ => (1..=points).map(|day| format!("Day {day}")).collect(),
    }
}

/// Counts shown next to sidebar entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuBadges {
    pub alerts: usize,
    pub protocols: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybookView {
    pub effectiveness: String,
    pub last_trained: String,
    pub scenarios_tested: u32,
    pub training: bool,
    pub model_accuracy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioCard {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRow {
    #[serde(flatten)]
    pub result: SimulationResult,
    pub accuracy_label: String,
}

impl SimulationRow {
    fn from_result(result: SimulationResult) -> Self {
        Self {
            accuracy_label: format!("{:.1}%", result.accuracy * 100.0),
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationPanel {
    pub scenarios: Vec<ScenarioCard>,
    pub latest: Option<SimulationRow>,
    pub history: Vec<SimulationRow>,
}

/// Everything the dashboard templates read.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub app_name: String,
    pub app_version: String,
    pub emergency_mode: bool,
    pub clock: String,
    pub stats: LiveStats,
    pub recent_alerts: Vec<AlertCard>,
    pub alerts: Vec<AlertCard>,
    pub alert_summary: AlertSummary,
    pub resources: Vec<ResourceCard>,
    pub protocols: Vec<ProtocolRow>,
    pub impact: ImpactMetrics,
    pub chart: ImpactChart,
    pub badges: MenuBadges,
    pub playbook: PlaybookView,
    pub simulation: SimulationPanel,
    pub map_stats: MapStats,
    pub model: PredictionStatus,
    pub notifications: Vec<Notification>,
    pub unread_notifications: usize,
    pub settings: AppSettings,
}

/// Fragments that can be re-rendered on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partial {
    Stats,
    Alerts,
    Resources,
    Protocols,
    Notifications,
}

impl Partial {
    fn template(&self) -> &'static str {
        match self {
            Self::Stats => "partials/stats.html",
            Self::Alerts => "partials/alerts.html",
            Self::Resources => "partials/resources.html",
            Self::Protocols => "partials/protocols.html",
            Self::Notifications => "partials/notifications.html",
        }
    }
}

impl FromStr for Partial {
    type Err = PoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "stats" => Ok(Self::Stats),
            "alerts" => Ok(Self::Alerts),
            "resources" => Ok(Self::Resources),
            "protocols" => Ok(Self::Protocols),
            "notifications" => Ok(Self::Notifications),
            _ => Err(PoError::not_found(format!("partial not found: {value}"))),
        }
    }
}

#[derive(Serialize)]
struct PaneContext<'a> {
    #[serde(flatten)]
    view: &'a DashboardView,
    tab: Tab,
    tab_name: &'static str,
}

#[derive(Serialize)]
struct IndexContext<'a> {
    #[serde(flatten)]
    view: &'a DashboardView,
    menu: &'a [MenuEntry],
    current_tab: Tab,
    pane_html: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UiStatus {
    pub initialized: bool,
    pub emergency_mode: bool,
}

/// Builds view models from the live services and renders them.
pub struct UiRefresher {
    settings: AppSettings,
    data: Arc<DataStore>,
    simulator: Arc<ScenarioSimulator>,
    prediction: Arc<PredictionService>,
    notifications: NotificationCenter,
    map: Arc<MapPresentation>,
    renderer: PaneRenderer,
    bus: EventBus,
    rng: Arc<dyn RandomSource>,
    emergency: AtomicBool,
    initialized: AtomicBool,
    chart: RwLock<ImpactChart>,
    last_view: RwLock<Option<DashboardView>>,
}

pub struct UiParts {
    pub settings: AppSettings,
    pub data: Arc<DataStore>,
    pub simulator: Arc<ScenarioSimulator>,
    pub prediction: Arc<PredictionService>,
    pub notifications: NotificationCenter,
    pub map: Arc<MapPresentation>,
    pub bus: EventBus,
    pub rng: Arc<dyn RandomSource>,
}

impl UiRefresher {
    pub fn new(parts: UiParts) -> PoResult<Self> {
        Ok(Self {
            settings: parts.settings,
            data: parts.data,
            simulator: parts.simulator,
            prediction: parts.prediction,
            notifications: parts.notifications,
            map: parts.map,
            renderer: PaneRenderer::new()?,
            bus: parts.bus,
            rng: parts.rng,
            emergency: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            chart: RwLock::new(ImpactChart::weekly()),
            last_view: RwLock::new(None),
        })
    }

    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let view = self.build().await;
        *self.last_view.write().await = Some(view);
        tracing::info!("ui refresher ready");
    }

    pub fn status(&self) -> UiStatus {
        UiStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            emergency_mode: self.is_emergency(),
        }
    }

    pub fn set_emergency(&self, enabled: bool) {
        self.emergency.store(enabled, Ordering::SeqCst);
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    /// Rebuilds the cached view and announces the change.
    pub async fn refresh(&self) -> DashboardView {
        let view = self.build().await;
        *self.last_view.write().await = Some(view.clone());
        self.bus.publish(SOURCE, DashboardEvent::DataUpdated);
        tracing::debug!(active = view.stats.active_triggers, "dashboard view refreshed");
        view
    }

    /// Last built view, building one if nothing is cached yet.
    pub async fn view(&self) -> DashboardView {
        if let Some(view) = self.last_view.read().await.clone() {
            return view;
        }
        let view = self.build().await;
        *self.last_view.write().await = Some(view.clone());
        view
    }

    pub async fn chart(&self) -> ImpactChart {
        self.chart.read().await.clone()
    }

    pub async fn update_chart(&self, period: &str) -> ImpactChart {
        let chart = ImpactChart::for_period(period, self.rng.as_ref());
        *self.chart.write().await = chart.clone();
        chart
    }

    pub async fn build(&self) -> DashboardView {
        let snapshot = self.data.snapshot().await;
        let alerts = &snapshot.alerts;
        let metrics = &snapshot.metrics;
        let history = self.simulator.history().await;
        let notifications = self.notifications.visible().await;
        let model = self.prediction.status().await;

        let stats = LiveStats {
            active_triggers: metrics.active_triggers,
            response_time: metrics.response_time_label(),
            uptime: metrics.uptime_label(),
            available_resources: snapshot
                .resources
                .iter()
                .filter(|resource| resource.status.is_deployable())
                .count(),
            total_resources: snapshot.resources.len(),
            ai_effectiveness: format!("{:.1}%", metrics.ai_effectiveness),
        };

        DashboardView {
            app_name: self.settings.app.name.clone(),
            app_version: self.settings.app.version.clone(),
            emergency_mode: self.is_emergency(),
            clock: clock_label(now_epoch_millis()),
            stats,
            recent_alerts: alerts
                .iter()
                .take(RECENT_ALERTS)
                .map(AlertCard::from_alert)
                .collect(),
            alerts: alerts.iter().map(AlertCard::from_alert).collect(),
            alert_summary: AlertSummary::from_alerts(alerts),
            resources: snapshot
                .resources
                .iter()
                .map(|resource| ResourceCard {
                    resource: resource.clone(),
                    icon: resource.kind.icon(),
                    color: status_color(resource.status),
                })
                .collect(),
            protocols: snapshot
                .protocols
                .iter()
                .map(|protocol| ProtocolRow {
                    protocol: protocol.clone(),
                    effectiveness_label: format!("{}%", protocol.effectiveness),
                    needs_review: protocol.effectiveness < REVIEW_THRESHOLD,
                })
                .collect(),
            impact: ImpactMetrics {
                accidents_prevented: metrics.accidents_prevented,
                lives_saved: format!("{:.1}", metrics.lives_saved),
                economic_impact: metrics.economic_impact.clone(),
            },
            chart: self.chart().await,
            badges: MenuBadges {
                alerts: alerts.iter().filter(|alert| alert.is_active()).count(),
                protocols: snapshot
                    .protocols
                    .iter()
                    .filter(|protocol| protocol.effectiveness < REVIEW_THRESHOLD)
                    .count(),
            },
            playbook: PlaybookView {
                effectiveness: format!("{:.1}%", snapshot.playbook.effectiveness),
                last_trained: format!(
                    "{} {}",
                    date_label(snapshot.playbook.last_trained_ms),
                    clock_label(snapshot.playbook.last_trained_ms)
                ),
                scenarios_tested: snapshot.playbook.scenarios_tested,
                training: self.prediction.is_training(),
                model_accuracy: model
                    .model
                    .as_ref()
                    .map(|info| format!("{:.1}%", info.accuracy * 100.0)),
            },
            simulation: SimulationPanel {
                scenarios: self
                    .simulator
                    .scenarios()
                    .iter()
                    .map(|scenario| ScenarioCard {
                        key: scenario.key,
                        name: scenario.name,
                        description: scenario.description,
                    })
                    .collect(),
                latest: history.first().cloned().map(SimulationRow::from_result),
                history: history
                    .into_iter()
                    .take(HISTORY_ROWS)
                    .map(SimulationRow::from_result)
                    .collect(),
            },
            map_stats: self.map.stats(alerts),
            model,
            unread_notifications: self.notifications.unread_count().await,
            notifications,
            settings: self.settings.clone(),
        }
    }

    pub async fn render_partial(&self, partial: Partial) -> PoResult<String> {
        let view = self.build().await;
        self.renderer.render(partial.template(), &view)
    }

    pub async fn render_index(&self, menu: &[MenuEntry], current: &TabView) -> PoResult<String> {
        let view = self.view().await;
        self.renderer.render(
            "index.html",
            &IndexContext {
                view: &view,
                menu,
                current_tab: current.tab,
                pane_html: &current.html,
            },
        )
    }
}

#[async_trait]
impl PaneSource for UiRefresher {
    async fn render_pane(&self, tab: Tab) -> PoResult<String> {
        let view = self.build().await;
        self.renderer.render_pane(
            tab,
            &PaneContext {
                view: &view,
                tab,
                tab_name: tab.name(),
            },
        )
    }
}
