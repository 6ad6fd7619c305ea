use po_config::MlSettings;
use po_core::{
    EpochMillis, ErrorCode, PoError, PoResult, RandomSource, Severity, now_epoch_millis,
};
use po_observability::{PREDICTIONS_TOTAL, TRAINING_RUNS_TOTAL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::features::{self, ModelFeatures, RiskFactors, RiskFeatures};

const MODEL_LOAD_MS: f64 = 1000.0;
const TRAINING_MS: f64 = 3000.0;
const ACCURACY_CEILING: f64 = 0.98;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub loaded: bool,
    pub accuracy: f64,
}

impl ModelInfo {
    fn mock() -> Self {
        Self {
            name: "Safety Prediction Model v1.0".to_string(),
            version: "1.0.0".to_string(),
            loaded: true,
            accuracy: 0.92,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub risk_level: f64,
    pub risk_category: Severity,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub factors: Option<RiskFactors>,
    pub timestamp_ms: EpochMillis,
    pub model_version: String,
    pub source: PredictionSource,
}

/// Response body accepted from a remote model.
#[derive(Debug, Deserialize)]
struct RemotePrediction {
    risk_level: f64,
    #[serde(default)]
    risk_category: Option<Severity>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    features: &'a ModelFeatures,
    timestamp: EpochMillis,
}

/// One labelled observation fed to a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: RiskFeatures,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub samples_processed: usize,
    pub training_time_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionStatus {
    pub initialized: bool,
    pub training: bool,
    pub model: Option<ModelInfo>,
    pub config: MlSettings,
}

struct TrainingGuard<'a>(&'a AtomicBool);

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct PredictionService {
    settings: MlSettings,
    model: RwLock<Option<ModelInfo>>,
    load_lock: Mutex<()>,
    training: AtomicBool,
    client: reqwest::Client,
    rng: Arc<dyn RandomSource>,
    pacing: f64,
}

impl PredictionService {
    pub fn new(settings: MlSettings, pacing: f64, rng: Arc<dyn RandomSource>) -> PoResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms.max(1)))
            .build()
            .map_err(|err| PoError::new(ErrorCode::Internal, err.to_string()))?;
        Ok(Self {
            settings,
            model: RwLock::new(None),
            load_lock: Mutex::new(()),
            training: AtomicBool::new(false),
            client,
            rng,
            pacing: pacing.max(0.0),
        })
    }

    /// Loads the model once; concurrent callers wait for the same load.
    pub async fn init(&self) -> ModelInfo {
        if let Some(model) = self.model.read().await.clone() {
            return model;
        }
        let _loading = self.load_lock.lock().await;
        if let Some(model) = self.model.read().await.clone() {
            return model;
        }
        self.pause(MODEL_LOAD_MS).await;
        let model = ModelInfo::mock();
        *self.model.write().await = Some(model.clone());
        tracing::info!(model = %model.name, accuracy = model.accuracy, "prediction model loaded");
        model
    }

    pub async fn predict(&self, features: &RiskFeatures) -> Prediction {
        self.predict_at(features, now_epoch_millis()).await
    }

    /// Scores `features` as of `at_ms`. A configured remote endpoint is tried
    /// first; any failure falls back to the local model.
    pub async fn predict_at(&self, features: &RiskFeatures, at_ms: EpochMillis) -> Prediction {
        let model = self.init().await;

        if let Some(endpoint) = self.settings.model_endpoint.as_deref() {
            match self.remote_predict(endpoint, features, at_ms).await {
                Ok(prediction) => {
                    metrics::counter!(PREDICTIONS_TOTAL, "source" => "remote").increment(1);
                    return prediction;
                }
                Err(err) => {
                    tracing::warn!(endpoint, error = %err, "remote prediction failed, using local model");
                }
            }
        }

        let prediction = self.local_predict(features, at_ms, &model.version);
        metrics::counter!(PREDICTIONS_TOTAL, "source" => "local").increment(1);
        tracing::debug!(
            risk_level = prediction.risk_level,
            category = %prediction.risk_category,
            "prediction computed"
        );
        prediction
    }

    fn local_predict(&self, features: &RiskFeatures, at_ms: EpochMillis, version: &str) -> Prediction {
        let factors = RiskFactors::derive(features, at_ms);
        let base = self.rng.range(0.3, 0.8);
        let score = (base + factors.weighted_sum()).clamp(0.0, 1.0);
        let confidence = self.rng.range(0.85, 0.95);

        Prediction {
            risk_level: round_to(score, 3),
            risk_category: features::risk_category(score),
            confidence: round_to(confidence, 2),
            recommendations: features::recommendations(score, &factors),
            factors: Some(factors),
            timestamp_ms: at_ms,
            model_version: version.to_string(),
            source: PredictionSource::Local,
        }
    }

    async fn remote_predict(
        &self,
        endpoint: &str,
        features: &RiskFeatures,
        at_ms: EpochMillis,
    ) -> PoResult<Prediction> {
        let prepared = ModelFeatures::prepare(features, at_ms);
        let response = self
            .client
            .post(endpoint)
            .json(&RemoteRequest {
                features: &prepared,
                timestamp: at_ms,
            })
            .send()
            .await
            .map_err(upstream)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PoError::new(
                ErrorCode::Upstream,
                format!("model API error: {status}"),
            ));
        }
        let remote: RemotePrediction = response.json().await.map_err(upstream)?;
        let score = remote.risk_level.clamp(0.0, 1.0);

        Ok(Prediction {
            risk_level: score,
            risk_category: remote
                .risk_category
                .unwrap_or_else(|| features::risk_category(score)),
            confidence: remote.confidence.unwrap_or(self.settings.confidence_threshold),
            recommendations: remote.recommendations.into_iter().take(5).collect(),
            factors: None,
            timestamp_ms: at_ms,
            model_version: self.settings.model_version.clone(),
            source: PredictionSource::Remote,
        })
    }

    /// Runs one mock training pass. Overlapping runs fail with `Conflict`.
    pub async fn train(&self, samples: &[TrainingSample]) -> PoResult<TrainingReport> {
        if self
            .training
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PoError::conflict("model is already training"));
        }
        let _guard = TrainingGuard(&self.training);

        self.init().await;
        tracing::info!(samples = samples.len(), "training started");
        self.pause(TRAINING_MS).await;

        let improvement = self.rng.range(0.0, 0.05);
        let accuracy = {
            let mut model = self.model.write().await;
            let model = model.get_or_insert_with(ModelInfo::mock);
            model.accuracy = (model.accuracy + improvement).min(ACCURACY_CEILING);
            model.accuracy
        };

        metrics::counter!(TRAINING_RUNS_TOTAL).increment(1);
        tracing::info!(accuracy, samples = samples.len(), "training completed");
        Ok(TrainingReport {
            accuracy,
            samples_processed: samples.len(),
            training_time_ms: (TRAINING_MS * self.pacing) as u64,
            message: "Model training completed successfully".to_string(),
        })
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> PredictionStatus {
        let model = self.model.read().await.clone();
        PredictionStatus {
            initialized: model.is_some(),
            training: self.is_training(),
            model,
            config: self.settings.clone(),
        }
    }

    async fn pause(&self, millis: f64) {
        let scaled = millis * self.pacing;
        if scaled > 0.0 {
            tokio::time::sleep(Duration::from_millis(scaled as u64)).await;
        }
    }
}

fn upstream(err: reqwest::Error) -> PoError {
    PoError::new(ErrorCode::Upstream, err.to_string())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use po_config::AppSettings;
    use chrono::{Local, TimeZone};
    use po_core::{FixedRandom, SeededRandom};

    fn noon() -> EpochMillis {
        Local
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .earliest()
            .expect("local noon")
            .timestamp_millis() as EpochMillis
    }

    fn service(rng: Arc<dyn RandomSource>, pacing: f64) -> Arc<PredictionService> {
        let settings = AppSettings::for_tests().ml;
        Arc::new(PredictionService::new(settings, pacing, rng).expect("client"))
    }

    #[tokio::test]
    async fn local_score_combines_weighted_factors() {
        let service = service(Arc::new(FixedRandom::constant(0.0)), 0.0);
        let prediction = service.predict_at(&RiskFeatures::default(), noon()).await;

        assert!((prediction.risk_level - 0.68).abs() < 1e-9);
        assert_eq!(prediction.risk_category, Severity::High);
        assert_eq!(prediction.confidence, 0.85);
        assert_eq!(
            prediction.recommendations,
            ["Increase patrol frequency", "Monitor traffic cameras closely"]
        );
        assert_eq!(prediction.source, PredictionSource::Local);
        assert_eq!(prediction.model_version, "1.0.0");
    }

    #[tokio::test]
    async fn scores_are_clamped_to_one() {
        let service = service(Arc::new(FixedRandom::constant(0.99)), 0.0);
        let features = RiskFeatures {
            traffic_density: Some(100.0),
            weather: Some("storm".into()),
            location_type: Some("highway".into()),
            historical_accidents: Some(10.0),
            ..RiskFeatures::default()
        };
        let prediction = service.predict_at(&features, noon()).await;
        assert_eq!(prediction.risk_level, 1.0);
        assert_eq!(prediction.risk_category, Severity::Critical);
        assert_eq!(prediction.recommendations.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn model_loads_lazily_after_delay() {
        let service = service(Arc::new(FixedRandom::constant(0.5)), 1.0);
        assert!(!service.status().await.initialized);

        let started = tokio::time::Instant::now();
        service.predict_at(&RiskFeatures::default(), noon()).await;
        assert!(started.elapsed() >= Duration::from_millis(1000));
        let status = service.status().await;
        assert!(status.initialized);
        assert_eq!(status.model.map(|model| model.accuracy), Some(0.92));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_training_is_rejected() {
        let service = service(Arc::new(FixedRandom::constant(0.5)), 1.0);
        service.init().await;

        let running = {
            let service = service.clone();
            tokio::spawn(async move { service.train(&[]).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(service.is_training());
        let err = service.train(&[]).await.expect_err("overlap");
        assert_eq!(err.code, ErrorCode::Conflict);

        let report = running.await.expect("join").expect("first run");
        assert!((report.accuracy - 0.945).abs() < 1e-9);
        assert!(!service.is_training());
        assert!(service.train(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn accuracy_never_exceeds_ceiling() {
        let service = service(Arc::new(SeededRandom::seeded(5)), 0.0);
        let samples = vec![
            TrainingSample {
                features: RiskFeatures::default(),
                severity: Severity::High,
            };
            12
        ];
        let mut last = 0.0;
        for _ in 0..20 {
            let report = service.train(&samples).await.expect("train");
            assert_eq!(report.samples_processed, 12);
            assert!(report.accuracy >= last);
            assert!(report.accuracy <= 0.98);
            last = report.accuracy;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_endpoint_falls_back_to_local() {
        let mut settings = AppSettings::for_tests().ml;
        settings.model_endpoint = Some("http://127.0.0.1:9/predict".to_string());
        settings.request_timeout_ms = 500;
        let service =
            PredictionService::new(settings, 0.0, Arc::new(FixedRandom::constant(0.0))).expect("client");
        let prediction = service.predict_at(&RiskFeatures::default(), noon()).await;
        assert_eq!(prediction.source, PredictionSource::Local);
        assert!(prediction.factors.is_some());
    }
}
