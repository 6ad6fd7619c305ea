use po_config::SimulationSettings;
use po_core::{PoError, PoResult, RandomSource, SimulationResult, now_epoch_millis};
use po_messaging::{DashboardEvent, EventBus, SimulationPhase};
use po_observability::{PERSIST_FAILURES_TOTAL, SCENARIOS_RUN_TOTAL};
use po_storage::{KeyValueStore, SIMULATION_HISTORY_KEY, load_json, persist_best_effort};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{self, Scenario};

const SOURCE: &str = "simulation";
const RISK_CEILING: f64 = 0.95;
const RESPONSE_FLOOR_S: f64 = 3.0;
const BATCH_PAUSE_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effectiveness {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Effectiveness {
    pub fn from_risk_percent(percent: f64) -> Self {
        if percent >= 80.0 {
            Self::Excellent
        } else if percent >= 70.0 {
            Self::Good
        } else if percent >= 60.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Completed(SimulationResult),
    Failed { scenario_key: String, error: String },
}

impl ScenarioOutcome {
    pub fn result(&self) -> Option<&SimulationResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub average_risk_reduction: String,
    pub average_response_time: String,
    pub overall_effectiveness: Effectiveness,
    pub best_scenario: Option<String>,
    pub worst_scenario: Option<String>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[ScenarioOutcome]) -> Self {
        let successful: Vec<&SimulationResult> =
            outcomes.iter().filter_map(ScenarioOutcome::result).collect();
        let total = outcomes.len();
        if successful.is_empty() {
            return Self {
                total,
                successful: 0,
                failed: total,
                average_risk_reduction: "0%".to_string(),
                average_response_time: "0s".to_string(),
                overall_effectiveness: Effectiveness::Poor,
                best_scenario: None,
                worst_scenario: None,
            };
        }

        let count = successful.len() as f64;
        let average_risk =
            successful.iter().map(|result| result.risk_reduction * 100.0).sum::<f64>() / count;
        let average_response =
            successful.iter().map(|result| result.response_time_s).sum::<f64>() / count;
        let by_risk = |a: &&&SimulationResult, b: &&&SimulationResult| {
            a.risk_reduction.total_cmp(&b.risk_reduction)
        };

        Self {
            total,
            successful: successful.len(),
            failed: total - successful.len(),
            average_risk_reduction: format!("{average_risk:.1}%"),
            average_response_time: format!("{average_response:.1}s"),
            overall_effectiveness: Effectiveness::from_risk_percent(average_risk),
            best_scenario: successful.iter().max_by(by_risk).map(|r| r.scenario.clone()),
            worst_scenario: successful.iter().min_by(by_risk).map(|r| r.scenario.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<ScenarioOutcome>,
    pub summary: BatchSummary,
}

/// Runs catalog scenarios against a random source and keeps a bounded,
/// most-recent-first result history.
pub struct ScenarioSimulator {
    history: RwLock<Vec<SimulationResult>>,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
    rng: Arc<dyn RandomSource>,
    pacing: f64,
    history_limit: usize,
}

impl ScenarioSimulator {
    pub fn new(
        settings: &SimulationSettings,
        storage: Arc<dyn KeyValueStore>,
        bus: EventBus,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            storage,
            bus,
            rng,
            pacing: settings.pacing.max(0.0),
            history_limit: settings.history_limit.max(1),
        }
    }

    pub async fn init(&self) {
        self.load_history().await;
        tracing::info!(entries = self.history.read().await.len(), "simulation service ready");
    }

    pub fn scenarios(&self) -> &'static [Scenario] {
        catalog::scenarios()
    }

    pub async fn run_scenario(&self, key: &str) -> PoResult<SimulationResult> {
        let scenario =
            catalog::find(key).ok_or_else(|| PoError::not_found(format!("unknown scenario: {key}")))?;

        tracing::info!(scenario = scenario.name, "running scenario");
        self.publish_status(SimulationPhase::Running, scenario.name);

        let processing_time_ms = self.rng.range(1000.0, 3000.0);
        self.pause(processing_time_ms).await;
        let result = self.evaluate(scenario, processing_time_ms as u64);

        {
            let mut history = self.history.write().await;
            history.insert(0, result.clone());
            history.truncate(self.history_limit);
        }
        self.persist_history().await;

        metrics::counter!(SCENARIOS_RUN_TOTAL, "scenario" => scenario.key).increment(1);
        self.publish_status(SimulationPhase::Completed, scenario.name);
        self.bus
            .publish(SOURCE, DashboardEvent::SimulationComplete(result.clone()));
        tracing::info!(
            scenario = scenario.name,
            risk_reduction = %result.risk_reduction_label,
            response_time = %result.response_time_label,
            "scenario completed"
        );
        Ok(result)
    }

    pub async fn run_all_scenarios(&self) -> BatchReport {
        let keys: Vec<&str> = catalog::scenarios().iter().map(|scenario| scenario.key).collect();
        self.run_batch(&keys).await
    }

    /// Runs the given scenarios in order with a short pause after each success.
    /// A failing entry is reported in place and does not stop the batch.
    pub async fn run_batch(&self, keys: &[&str]) -> BatchReport {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            match self.run_scenario(key).await {
                Ok(result) => {
                    results.push(ScenarioOutcome::Completed(result));
                    self.pause(BATCH_PAUSE_MS).await;
                }
                Err(err) => {
                    tracing::error!(scenario = key, error = %err, "scenario failed");
                    self.publish_status(SimulationPhase::Failed, key);
                    results.push(ScenarioOutcome::Failed {
                        scenario_key: key.to_string(),
                        error: err.message,
                    });
                }
            }
        }

        let summary = BatchSummary::from_outcomes(&results);
        tracing::info!(
            total = summary.total,
            successful = summary.successful,
            effectiveness = ?summary.overall_effectiveness,
            "scenario batch finished"
        );
        self.bus.publish(
            SOURCE,
            DashboardEvent::SimulationBatchComplete {
                total: summary.total,
                successful: summary.successful,
            },
        );
        BatchReport { results, summary }
    }

    pub async fn history(&self) -> Vec<SimulationResult> {
        self.history.read().await.clone()
    }

    pub async fn latest(&self) -> Option<SimulationResult> {
        self.history.read().await.first().cloned()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
        if let Err(err) = self.storage.remove(SIMULATION_HISTORY_KEY).await {
            tracing::warn!(error = %err, "could not remove simulation history");
        }
        tracing::info!("simulation history cleared");
    }

    pub async fn load_history(&self) {
        match load_json::<Vec<SimulationResult>>(self.storage.as_ref(), SIMULATION_HISTORY_KEY).await
        {
            Ok(Some(mut saved)) => {
                saved.truncate(self.history_limit);
                *self.history.write().await = saved;
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "could not load simulation history"),
        }
    }

    fn evaluate(&self, scenario: &Scenario, processing_time_ms: u64) -> SimulationResult {
        let base_risk = self.rng.range(0.6, 0.9);
        let base_response = self.rng.range(5.0, 10.0);

        let risk = (base_risk + catalog::risk_adjustment(&scenario.parameters)).min(RISK_CEILING);
        let risk_percent = round_to(risk * 100.0, 1);
        let response = (base_response + catalog::response_adjustment(&scenario.parameters))
            .max(RESPONSE_FLOOR_S);
        let accuracy = round_to(self.rng.range(0.85, 0.95), 2);

        SimulationResult {
            scenario_key: scenario.key.to_string(),
            scenario: scenario.name.to_string(),
            risk_reduction: risk,
            risk_reduction_label: format!("{risk_percent:.1}%"),
            response_time_s: round_to(response, 1),
            response_time_label: format!("{response:.1}s"),
            accuracy,
            recommendations: catalog::recommendations(&scenario.parameters, risk_percent),
            parameters: scenario.parameters.clone(),
            expected_outcomes: scenario.expected_outcomes.clone(),
            processing_time_ms,
            timestamp_ms: now_epoch_millis(),
        }
    }

    async fn pause(&self, millis: f64) {
        let scaled = millis * self.pacing;
        if scaled > 0.0 {
            tokio::time::sleep(Duration::from_millis(scaled as u64)).await;
        }
    }

    async fn persist_history(&self) {
        let history = self.history.read().await.clone();
        if !persist_best_effort(self.storage.as_ref(), SIMULATION_HISTORY_KEY, &history).await {
            metrics::counter!(PERSIST_FAILURES_TOTAL, "key" => SIMULATION_HISTORY_KEY).increment(1);
        }
    }

    fn publish_status(&self, phase: SimulationPhase, scenario: &str) {
        self.bus.publish(
            SOURCE,
            DashboardEvent::SimulationStatus {
                phase,
                scenario: scenario.to_string(),
            },
        );
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use po_config::AppSettings;
    use po_core::{ErrorCode, FixedRandom, SeededRandom};
    use po_storage::MemoryStore;

    fn simulator(rng: Arc<dyn RandomSource>, pacing: f64) -> (Arc<MemoryStore>, EventBus, ScenarioSimulator) {
        let mut settings = AppSettings::for_tests().simulation;
        settings.pacing = pacing;
        let storage = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let simulator = ScenarioSimulator::new(&settings, storage.clone(), bus.clone(), rng);
        (storage, bus, simulator)
    }

    #[tokio::test]
    async fn unknown_scenario_fails_before_any_mutation() {
        let (storage, bus, simulator) = simulator(Arc::new(FixedRandom::constant(0.5)), 0.0);
        let mut events = bus.subscribe();

        let err = simulator.run_scenario("volcano").await.expect_err("unknown");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "unknown scenario: volcano");
        assert!(simulator.history().await.is_empty());
        assert_eq!(storage.write_count(), 0);
        assert!(events.drain().is_empty());
    }

    #[tokio::test]
    async fn weather_emergency_adds_heavy_rain_bonus() {
        let (_storage, _bus, simulator) = simulator(Arc::new(FixedRandom::constant(0.0)), 0.0);
        let result = simulator
            .run_scenario("weather_emergency")
            .await
            .expect("scenario");
        assert!((result.risk_reduction - 0.70).abs() < 1e-9);
        assert_eq!(result.risk_reduction_label, "70.0%");
        assert_eq!(result.response_time_label, "5.0s");
        assert_eq!(result.accuracy, 0.85);
        assert_eq!(result.recommendations.len(), 4);
        assert_eq!(result.recommendations[0], "Good performance - minor optimizations needed");
    }

    #[tokio::test]
    async fn results_stay_within_published_bounds() {
        let (_storage, _bus, simulator) = simulator(Arc::new(SeededRandom::seeded(7)), 0.0);
        for scenario in catalog::scenarios() {
            for _ in 0..20 {
                let result = simulator.run_scenario(scenario.key).await.expect("scenario");
                assert!((0.6..=0.95).contains(&result.risk_reduction));
                assert!(result.risk_reduction_label.ends_with('%'));
                assert!(result.response_time_s >= 3.0);
                assert!((0.85..=0.95).contains(&result.accuracy));
                assert!(result.recommendations.len() <= 5);
            }
        }
    }

    #[tokio::test]
    async fn history_keeps_fifty_most_recent_first() {
        let (storage, _bus, simulator) = simulator(Arc::new(SeededRandom::seeded(11)), 0.0);
        for run in 0..60 {
            let key = if run == 59 { "highway_accident" } else { "rush_hour" };
            simulator.run_scenario(key).await.expect("scenario");
        }
        let history = simulator.history().await;
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].scenario_key, "highway_accident");

        let reloaded = ScenarioSimulator::new(
            &AppSettings::for_tests().simulation,
            storage.clone(),
            EventBus::new(),
            Arc::new(FixedRandom::constant(0.5)),
        );
        reloaded.load_history().await;
        assert_eq!(reloaded.history().await.len(), 50);

        reloaded.clear_history().await;
        assert!(reloaded.history().await.is_empty());
        assert_eq!(storage.get(SIMULATION_HISTORY_KEY).await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn processing_delay_follows_pacing() {
        let (_storage, _bus, simulator) = simulator(Arc::new(FixedRandom::constant(0.5)), 1.0);
        let started = tokio::time::Instant::now();
        let result = simulator.run_scenario("rush_hour").await.expect("scenario");
        assert_eq!(result.processing_time_ms, 2000);
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn batch_reports_failures_in_place() {
        let (_storage, bus, simulator) = simulator(Arc::new(FixedRandom::constant(0.0)), 0.0);
        let mut events = bus.subscribe();
        let report = simulator
            .run_batch(&["weather_emergency", "volcano", "weekend_night"])
            .await;

        assert_eq!(report.results.len(), 3);
        assert!(matches!(report.results[1], ScenarioOutcome::Failed { .. }));
        let summary = &report.summary;
        assert_eq!((summary.total, summary.successful, summary.failed), (3, 2, 1));
        assert_eq!(summary.average_risk_reduction, "65.0%");
        assert_eq!(summary.overall_effectiveness, Effectiveness::Fair);
        assert_eq!(summary.best_scenario.as_deref(), Some("Weather Emergency"));
        assert_eq!(summary.worst_scenario.as_deref(), Some("Weekend Night"));

        let names: Vec<&str> = events.drain().iter().map(|envelope| envelope.event.name()).collect();
        assert_eq!(names.last(), Some(&"simulation-batch-complete"));
        assert_eq!(names.iter().filter(|name| **name == "simulation-complete").count(), 2);
    }

    #[tokio::test]
    async fn run_all_covers_the_catalog() {
        let (_storage, _bus, simulator) = simulator(Arc::new(SeededRandom::seeded(3)), 0.0);
        let report = simulator.run_all_scenarios().await;
        assert_eq!(report.summary.total, 5);
        assert_eq!(report.summary.failed, 0);
        assert!(report.summary.best_scenario.is_some());
        assert_eq!(simulator.history().await.len(), 5);
        assert_eq!(
            simulator.latest().await.map(|result| result.scenario_key),
            Some("highway_accident".to_string())
        );
    }
}
