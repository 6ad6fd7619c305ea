use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_env(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "dev" | "development" => Self::Dev,
            "test" | "testing" => Self::Test,
            "staging" => Self::Staging,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub environment: Environment,
    pub bind_addr: String,
    pub metrics_addr: Option<String>,
    pub log_level: String,
    pub data_dir: String,
}

impl ServiceConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        let service_name = env_var("PO_SERVICE_NAME", default_service_name.to_string());
        let environment = Environment::from_env(&env_var("PO_ENV", "local".to_string()));
        let bind_addr = env_var("PO_BIND_ADDR", "0.0.0.0:8080".to_string());
        let metrics_addr = env::var("PO_METRICS_ADDR").ok();
        // Empty selects the observability defaults for this service.
        let log_level = env_var("PO_LOG_LEVEL", String::new());
        let data_dir = env_var("PO_DATA_DIR", "data".to_string());

        Self {
            service_name,
            environment,
            bind_addr,
            metrics_addr,
            log_level,
            data_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSettings {
    pub default_center: (f64, f64),
    pub default_zoom: u8,
    pub tile_layer: String,
    pub tile_attribution: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl MapSettings {
    pub fn from_env() -> Self {
        Self {
            default_center: (
                env_var_f64("PO_MAP_CENTER_LAT", -26.2041),
                env_var_f64("PO_MAP_CENTER_LNG", 28.0473),
            ),
            default_zoom: env_var_u8("PO_MAP_ZOOM", 12),
            tile_layer: env_var(
                "PO_MAP_TILE_URL",
                "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            ),
            tile_attribution: env_var(
                "PO_MAP_TILE_ATTRIBUTION",
                "&copy; OpenStreetMap contributors".to_string(),
            ),
            min_zoom: env_var_u8("PO_MAP_MIN_ZOOM", 8),
            max_zoom: env_var_u8("PO_MAP_MAX_ZOOM", 18),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub enabled: bool,
    pub max_alerts: usize,
    pub history_limit: usize,
    /// Multiplier applied to every simulated delay; `0.0` disables them.
    pub pacing: f64,
}

impl SimulationSettings {
    pub fn from_env() -> Self {
        Self {
            enabled: env_var_bool("PO_SIMULATION_ENABLED", true),
            max_alerts: env_var_usize("PO_SIMULATION_MAX_ALERTS", 50),
            history_limit: env_var_usize("PO_SIMULATION_HISTORY_LIMIT", 50),
            pacing: env_var_f64("PO_SIMULATION_PACING", 1.0).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlSettings {
    pub enabled: bool,
    pub model_endpoint: Option<String>,
    pub request_timeout_ms: u64,
    pub prediction_threshold: f64,
    pub confidence_threshold: f64,
    pub model_version: String,
}

impl MlSettings {
    pub fn from_env() -> Self {
        Self {
            enabled: env_var_bool("PO_ML_ENABLED", true),
            model_endpoint: env::var("PO_ML_ENDPOINT")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            request_timeout_ms: env_var_u64("PO_ML_TIMEOUT_MS", 5000),
            prediction_threshold: env_var_f64("PO_ML_PREDICTION_THRESHOLD", 0.7),
            confidence_threshold: env_var_f64("PO_ML_CONFIDENCE_THRESHOLD", 0.8),
            model_version: env_var("PO_ML_MODEL_VERSION", "v1.0".to_string()),
        }
    }
}

/// Timer cadence of the monitoring loops for one operating mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cadence {
    pub refresh_ms: u64,
    pub stats_ms: Option<u64>,
    pub alert_min_ms: u64,
    pub alert_max_ms: u64,
    pub alert_probability: f64,
}

impl Cadence {
    pub fn normal() -> Self {
        Self {
            refresh_ms: 10_000,
            stats_ms: Some(5_000),
            alert_min_ms: 30_000,
            alert_max_ms: 60_000,
            alert_probability: 0.3,
        }
    }

    /// Emergency refresh also jitters stats, so no separate stats loop runs.
    pub fn emergency() -> Self {
        Self {
            refresh_ms: 2_000,
            stats_ms: None,
            alert_min_ms: 10_000,
            alert_max_ms: 10_000,
            alert_probability: 0.5,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub normal: Cadence,
    pub emergency: Cadence,
}

impl MonitoringSettings {
    pub fn from_env() -> Self {
        let mut normal = Cadence::normal();
        normal.refresh_ms = env_var_u64("PO_REFRESH_MS", normal.refresh_ms);
        normal.stats_ms = Some(env_var_u64("PO_STATS_MS", 5_000));
        let mut emergency = Cadence::emergency();
        emergency.refresh_ms = env_var_u64("PO_EMERGENCY_REFRESH_MS", emergency.refresh_ms);
        Self { normal, emergency }
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            normal: Cadence::normal(),
            emergency: Cadence::emergency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub storage_key: String,
    pub auto_save: bool,
}

impl DataSettings {
    pub fn from_env() -> Self {
        Self {
            storage_key: env_var("PO_STORAGE_KEY", "preventionOrchestratorData".to_string()),
            auto_save: env_var_bool("PO_AUTO_SAVE", true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppInfo,
    pub map: MapSettings,
    pub simulation: SimulationSettings,
    pub ml: MlSettings,
    pub monitoring: MonitoringSettings,
    pub data: DataSettings,
}

impl AppSettings {
    pub fn from_env() -> Self {
        Self {
            app: AppInfo {
                name: env_var("PO_APP_NAME", "Prevention Orchestrator".to_string()),
                version: env_var("PO_APP_VERSION", "1.0.0".to_string()),
                debug: env_var_bool("PO_DEBUG", false),
            },
            map: MapSettings::from_env(),
            simulation: SimulationSettings::from_env(),
            ml: MlSettings::from_env(),
            monitoring: MonitoringSettings::from_env(),
            data: DataSettings::from_env(),
        }
    }

    /// Fixed settings with every simulated delay disabled and no remote endpoint.
    /// Ignores the environment.
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_tests() -> Self {
        Self {
            app: AppInfo {
                name: "Prevention Orchestrator".to_string(),
                version: "1.0.0".to_string(),
                debug: false,
            },
            map: MapSettings {
                default_center: (-26.2041, 28.0473),
                default_zoom: 12,
                tile_layer: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
                tile_attribution: "&copy; OpenStreetMap contributors".to_string(),
                min_zoom: 8,
                max_zoom: 18,
            },
            simulation: SimulationSettings {
                enabled: true,
                max_alerts: 50,
                history_limit: 50,
                pacing: 0.0,
            },
            ml: MlSettings {
                enabled: true,
                model_endpoint: None,
                request_timeout_ms: 5000,
                prediction_threshold: 0.7,
                confidence_threshold: 0.8,
                model_version: "v1.0".to_string(),
            },
            monitoring: MonitoringSettings::default(),
            data: DataSettings {
                storage_key: "preventionOrchestratorData".to_string(),
                auto_save: true,
            },
        }
    }
}

fn env_var(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_var_u8(key: &str, default: u8) -> u8 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u8>().ok())
        .unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_var_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

fn env_var_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names_fall_back_to_local() {
        assert_eq!(Environment::from_env("Production"), Environment::Prod);
        assert_eq!(Environment::from_env("qa"), Environment::Local);
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_settings_ignore_the_environment() {
        let settings = AppSettings::for_tests();
        assert_eq!(settings.simulation.history_limit, 50);
        assert_eq!(settings.simulation.pacing, 0.0);
        assert!(settings.ml.model_endpoint.is_none());
        assert_eq!(settings.monitoring.normal, Cadence::normal());
    }

    #[test]
    fn emergency_cadence_is_tighter_than_normal() {
        let normal = Cadence::normal();
        let emergency = Cadence::emergency();
        assert!(emergency.refresh_ms < normal.refresh_ms);
        assert!(emergency.alert_max_ms < normal.alert_min_ms);
        assert!(emergency.alert_probability > normal.alert_probability);
    }
}
