use po_config::MapSettings;
use po_core::{
    Alert, AlertId, RandomSource, Resource, ResourceId, ResourceStatus, Severity, clock_label,
    now_epoch_millis,
};
use po_geo::Coordinate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

const TRAFFIC_MARKERS: usize = 20;
const RISK_CIRCLES: usize = 50;
const ALERT_SPAN: f64 = 0.1;
const RESOURCE_SPAN: f64 = 0.08;
const TRAFFIC_SPAN: f64 = 0.15;
const RISK_SPAN: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Traffic,
    Risk,
    Alerts,
    Resources,
}

impl LayerKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "traffic" => Some(Self::Traffic),
            "risk" => Some(Self::Risk),
            "alerts" => Some(Self::Alerts),
            "resources" => Some(Self::Resources),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficMarker {
    pub position: Coordinate,
    pub level: f64,
    pub color: &'static str,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskCircle {
    pub position: Coordinate,
    pub intensity: f64,
    pub radius_m: f64,
    pub color: &'static str,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMarker {
    pub alert_id: AlertId,
    pub position: Coordinate,
    pub color: &'static str,
    pub title: String,
    pub location: String,
    pub severity: Severity,
    pub confidence: f64,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceMarker {
    pub resource_id: ResourceId,
    pub position: Coordinate,
    pub color: &'static str,
    pub icon: &'static str,
    pub name: String,
    pub status: ResourceStatus,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerVisibility {
    pub traffic: bool,
    pub risk: bool,
    pub alerts: bool,
    pub resources: bool,
}

impl LayerVisibility {
    fn flag(&mut self, kind: LayerKind) -> &mut bool {
        match kind {
            LayerKind::Traffic => &mut self.traffic,
            LayerKind::Risk => &mut self.risk,
            LayerKind::Alerts => &mut self.alerts,
            LayerKind::Resources => &mut self.resources,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapStats {
    pub alert_count: usize,
    pub high_risk_zones: usize,
    pub last_updated: String,
}

/// Everything a client needs to draw the map.
#[derive(Debug, Clone, Serialize)]
pub struct MapSnapshot {
    pub view: MapView,
    pub tile_layer: String,
    pub tile_attribution: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub visible: LayerVisibility,
    pub traffic: Vec<TrafficMarker>,
    pub risk: Vec<RiskCircle>,
    pub alerts: Vec<AlertMarker>,
    pub resources: Vec<ResourceMarker>,
}

struct MapState {
    view: MapView,
    visible: LayerVisibility,
    traffic: Vec<TrafficMarker>,
    risk: Vec<RiskCircle>,
    alerts: Vec<AlertMarker>,
    resources: Vec<ResourceMarker>,
    initialized: bool,
}

/// Marker and overlay layers scattered around the configured center.
pub struct MapPresentation {
    settings: MapSettings,
    rng: Arc<dyn RandomSource>,
    state: RwLock<MapState>,
}

impl MapPresentation {
    pub fn new(settings: MapSettings, rng: Arc<dyn RandomSource>) -> Self {
        let view = MapView {
            center: Coordinate::from(settings.default_center),
            zoom: settings.default_zoom,
        };
        Self {
            settings,
            rng,
            state: RwLock::new(MapState {
                view,
                visible: LayerVisibility {
                    traffic: true,
                    risk: true,
                    alerts: true,
                    resources: true,
                },
                traffic: Vec::new(),
                risk: Vec::new(),
                alerts: Vec::new(),
                resources: Vec::new(),
                initialized: false,
            }),
        }
    }

    pub async fn init(&self, alerts: &[Alert], resources: &[Resource]) {
        if self.state.read().await.initialized {
            return;
        }
        self.refresh(alerts, resources).await;
        self.state.write().await.initialized = true;
        tracing::info!("map presentation ready");
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Clears every layer and rebuilds it from current data.
    pub async fn refresh(&self, alerts: &[Alert], resources: &[Resource]) {
        let center = self.center();
        let alert_markers = alerts
            .iter()
            .map(|alert| self.alert_marker(center, alert))
            .collect();
        let resource_markers = resources
            .iter()
            .map(|resource| self.resource_marker(center, resource))
            .collect();
        let traffic = (0..TRAFFIC_MARKERS)
            .map(|_| self.traffic_marker(center))
            .collect();
        let risk = (0..RISK_CIRCLES).map(|_| self.risk_circle(center)).collect();

        let mut state = self.state.write().await;
        state.alerts = alert_markers;
        state.resources = resource_markers;
        state.traffic = traffic;
        state.risk = risk;
        tracing::debug!(alerts = alerts.len(), resources = resources.len(), "map layers rebuilt");
    }

    pub async fn add_alert_marker(&self, alert: &Alert) {
        let marker = self.alert_marker(self.center(), alert);
        self.state.write().await.alerts.push(marker);
    }

    pub async fn toggle_traffic(&self) -> bool {
        self.toggle_layer(LayerKind::Traffic).await
    }

    /// Flips a layer's visibility and returns the new value.
    pub async fn toggle_layer(&self, kind: LayerKind) -> bool {
        let mut state = self.state.write().await;
        let flag = state.visible.flag(kind);
        *flag = !*flag;
        *flag
    }

    pub async fn zoom_to_city(&self, city: &str) -> MapView {
        let center = match city {
            "johannesburg" => Coordinate::new(-26.2041, 28.0473),
            "pretoria" => Coordinate::new(-25.7479, 28.2293),
            "capetown" => Coordinate::new(-33.9249, 18.4241),
            "durban" => Coordinate::new(-29.8587, 31.0218),
            _ => self.center(),
        };
        let mut state = self.state.write().await;
        state.view = MapView {
            center,
            zoom: self.settings.default_zoom,
        };
        state.view
    }

    pub fn stats(&self, alerts: &[Alert]) -> MapStats {
        MapStats {
            alert_count: alerts.len(),
            high_risk_zones: alerts
                .iter()
                .filter(|alert| alert.severity >= Severity::High)
                .count(),
            last_updated: clock_label(now_epoch_millis())[..5].to_string(),
        }
    }

    pub async fn snapshot(&self) -> MapSnapshot {
        let state = self.state.read().await;
        MapSnapshot {
            view: state.view,
            tile_layer: self.settings.tile_layer.clone(),
            tile_attribution: self.settings.tile_attribution.clone(),
            min_zoom: self.settings.min_zoom,
            max_zoom: self.settings.max_zoom,
            visible: state.visible,
            traffic: state.traffic.clone(),
            risk: state.risk.clone(),
            alerts: state.alerts.clone(),
            resources: state.resources.clone(),
        }
    }

    fn center(&self) -> Coordinate {
        Coordinate::from(self.settings.default_center)
    }

    fn alert_marker(&self, center: Coordinate, alert: &Alert) -> AlertMarker {
        AlertMarker {
            alert_id: alert.id.clone(),
            position: center.jitter(ALERT_SPAN, self.rng.as_ref()),
            color: severity_color(alert.severity),
            title: alert.alert_type.clone(),
            location: alert.location.clone(),
            severity: alert.severity,
            confidence: alert.confidence,
            time: alert.time.clone(),
        }
    }

    fn resource_marker(&self, center: Coordinate, resource: &Resource) -> ResourceMarker {
        ResourceMarker {
            resource_id: resource.id.clone(),
            position: center.jitter(RESOURCE_SPAN, self.rng.as_ref()),
            color: status_color(resource.status),
            icon: resource.kind.icon(),
            name: resource.name.clone(),
            status: resource.status,
            location: resource.location.clone(),
        }
    }

    fn traffic_marker(&self, center: Coordinate) -> TrafficMarker {
        let position = center.jitter(TRAFFIC_SPAN, self.rng.as_ref());
        let level = self.rng.next_f64();
        TrafficMarker {
            position,
            level,
            color: traffic_color(level),
            size: (level * 15.0).max(5.0),
        }
    }

    fn risk_circle(&self, center: Coordinate) -> RiskCircle {
        let position = center.jitter(RISK_SPAN, self.rng.as_ref());
        let intensity = self.rng.next_f64();
        RiskCircle {
            position,
            intensity,
            radius_m: 100.0 + intensity * 200.0,
            color: risk_color(intensity),
            opacity: 0.3 + intensity * 0.3,
        }
    }
}

pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#ef4444",
        Severity::High => "#f97316",
        Severity::Medium => "#f59e0b",
        Severity::Low => "#10b981",
    }
}

pub fn status_color(status: ResourceStatus) -> &'static str {
    match status {
        ResourceStatus::Available => "#10b981",
        ResourceStatus::Active => "#3b82f6",
        ResourceStatus::OnDuty => "#8b5cf6",
        ResourceStatus::Charging => "#f59e0b",
        ResourceStatus::Maintenance | ResourceStatus::Deploying => "#6b7280",
    }
}

fn traffic_color(level: f64) -> &'static str {
    if level > 0.7 {
        "#ef4444"
    } else if level > 0.4 {
        "#f59e0b"
    } else {
        "#10b981"
    }
}

fn risk_color(intensity: f64) -> &'static str {
    if intensity > 0.7 {
        "#ef4444"
    } else if intensity > 0.4 {
        "#f59e0b"
    } else if intensity > 0.2 {
        "#fbbf24"
    } else {
        "#10b981"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use po_config::AppSettings;
    use po_core::{FixedRandom, SeededRandom};
    use po_data::seed::{sample_alerts, sample_resources};
    use po_geo::BoundingBox;

    fn map(rng: Arc<dyn RandomSource>) -> MapPresentation {
        MapPresentation::new(AppSettings::for_tests().map, rng)
    }

    #[tokio::test]
    async fn refresh_builds_every_layer() {
        let map = map(Arc::new(SeededRandom::seeded(1)));
        map.init(&sample_alerts(0), &sample_resources()).await;
        let snapshot = map.snapshot().await;

        assert_eq!(snapshot.traffic.len(), 20);
        assert_eq!(snapshot.risk.len(), 50);
        assert_eq!(snapshot.alerts.len(), 5);
        assert_eq!(snapshot.resources.len(), 8);

        let bounds = BoundingBox::around(snapshot.view.center, RISK_SPAN);
        assert!(snapshot.risk.iter().all(|circle| bounds.contains(circle.position)));
        assert!(
            snapshot
                .risk
                .iter()
                .all(|circle| (100.0..=300.0).contains(&circle.radius_m))
        );
    }

    #[tokio::test]
    async fn colors_follow_thresholds() {
        assert_eq!(traffic_color(0.71), "#ef4444");
        assert_eq!(traffic_color(0.5), "#f59e0b");
        assert_eq!(risk_color(0.3), "#fbbf24");
        assert_eq!(risk_color(0.1), "#10b981");
        assert_eq!(severity_color(Severity::High), "#f97316");
        assert_eq!(status_color(ResourceStatus::OnDuty), "#8b5cf6");

        let map = map(Arc::new(FixedRandom::constant(0.1)));
        map.refresh(&[], &[]).await;
        let traffic = &map.snapshot().await.traffic[0];
        assert_eq!(traffic.size, 5.0);
    }

    #[tokio::test]
    async fn toggles_and_stats() {
        let map = map(Arc::new(SeededRandom::seeded(2)));
        assert!(!map.toggle_traffic().await);
        assert!(map.toggle_traffic().await);
        assert!(!map.toggle_layer(LayerKind::Risk).await);
        assert!(!map.snapshot().await.visible.risk);

        let stats = map.stats(&sample_alerts(0));
        assert_eq!(stats.alert_count, 5);
        assert_eq!(stats.high_risk_zones, 3);

        let view = map.zoom_to_city("pretoria").await;
        assert_eq!(view.center, Coordinate::new(-25.7479, 28.2293));
    }
}
