use po_core::{EpochMillis, Severity, day_of_week, hour_of_day};
use serde::{Deserialize, Serialize};

const DEFAULT_LATITUDE: f64 = -26.2041;
const DEFAULT_LONGITUDE: f64 = 28.0473;

/// Caller-supplied observations. Missing values take neutral defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatures {
    pub traffic_density: Option<f64>,
    pub weather: Option<String>,
    pub location_type: Option<String>,
    pub historical_accidents: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub vehicle_count: Option<u32>,
    pub average_speed: Option<f64>,
}

/// Normalized factors that feed the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub traffic_density: f64,
    pub time_of_day: f64,
    pub weather: f64,
    pub location_type: f64,
    pub historical_accidents: f64,
}

impl RiskFactors {
    pub fn derive(features: &RiskFeatures, at_ms: EpochMillis) -> Self {
        Self {
            traffic_density: features.traffic_density.unwrap_or(50.0) / 100.0,
            time_of_day: time_of_day_factor(hour_of_day(at_ms)),
            weather: weather_factor(features.weather.as_deref()),
            location_type: location_factor(features.location_type.as_deref()),
            historical_accidents: features.historical_accidents.unwrap_or(0.0) / 10.0,
        }
    }

    pub fn weighted_sum(&self) -> f64 {
        self.traffic_density * 0.3
            + self.time_of_day * 0.2
            + self.weather * 0.25
            + self.location_type * 0.15
            + self.historical_accidents * 0.1
    }
}

/// Wire form sent to a remote model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFeatures {
    pub traffic_density: f64,
    pub time_of_day: u32,
    pub day_of_week: u32,
    pub weather_condition: String,
    pub location_lat: f64,
    pub location_lng: f64,
    pub vehicle_count: u32,
    pub avg_speed: f64,
    pub accident_history: f64,
}

impl ModelFeatures {
    pub fn prepare(features: &RiskFeatures, at_ms: EpochMillis) -> Self {
        Self {
            traffic_density: features.traffic_density.unwrap_or(0.0),
            time_of_day: hour_of_day(at_ms),
            day_of_week: day_of_week(at_ms),
            weather_condition: features
                .weather
                .clone()
                .unwrap_or_else(|| "clear".to_string()),
            location_lat: features.latitude.unwrap_or(DEFAULT_LATITUDE),
            location_lng: features.longitude.unwrap_or(DEFAULT_LONGITUDE),
            vehicle_count: features.vehicle_count.unwrap_or(0),
            avg_speed: features.average_speed.unwrap_or(60.0),
            accident_history: features.historical_accidents.unwrap_or(0.0),
        }
    }
}

pub fn time_of_day_factor(hour: u32) -> f64 {
    match hour {
        7..=9 => 0.8,
        16..=18 => 0.9,
        0..=5 | 22.. => 0.7,
        _ => 0.4,
    }
}

pub fn weather_factor(weather: Option<&str>) -> f64 {
    match weather {
        Some("clear") => 0.1,
        Some("cloudy") => 0.2,
        Some("rain") => 0.6,
        Some("heavy_rain") => 0.8,
        Some("fog") => 0.7,
        Some("storm") => 0.9,
        _ => 0.3,
    }
}

pub fn location_factor(location_type: Option<&str>) -> f64 {
    match location_type {
        Some("highway") => 0.7,
        Some("intersection") => 0.6,
        Some("school_zone") => 0.5,
        Some("residential") => 0.3,
        Some("commercial") => 0.4,
        Some("rural") => 0.2,
        _ => 0.5,
    }
}

pub fn risk_category(score: f64) -> Severity {
    if score >= 0.8 {
        Severity::Critical
    } else if score >= 0.6 {
        Severity::High
    } else if score >= 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Rule-based advice, deduplicated and capped at five entries.
pub fn recommendations(score: f64, factors: &RiskFactors) -> Vec<String> {
    let mut lines: Vec<&str> = Vec::new();
    if score > 0.7 {
        lines.extend([
            "Dispatch emergency response team",
            "Activate nearby variable message signs",
            "Send alerts to all vehicles in area",
        ]);
    }
    if score > 0.5 {
        lines.extend(["Increase patrol frequency", "Monitor traffic cameras closely"]);
    }
    if factors.traffic_density > 0.7 {
        lines.extend(["Consider traffic diversion routes", "Adjust traffic signal timing"]);
    }
    if factors.weather > 0.5 {
        lines.extend(["Issue weather advisory", "Reduce speed limits by 20%"]);
    }

    let mut unique: Vec<String> = Vec::with_capacity(5);
    for line in lines {
        if unique.len() == 5 {
            break;
        }
        if !unique.iter().any(|existing| existing == line) {
            unique.push(line.to_string());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn local_noon_friday() -> EpochMillis {
        Local
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .earliest()
            .expect("local noon")
            .timestamp_millis() as EpochMillis
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(time_of_day_factor(7), 0.8);
        assert_eq!(time_of_day_factor(9), 0.8);
        assert_eq!(time_of_day_factor(16), 0.9);
        assert_eq!(time_of_day_factor(22), 0.7);
        assert_eq!(time_of_day_factor(5), 0.7);
        assert_eq!(time_of_day_factor(12), 0.4);
        assert_eq!(time_of_day_factor(6), 0.4);
    }

    #[test]
    fn lookup_maps_fall_back_for_unknown_values() {
        assert_eq!(weather_factor(Some("storm")), 0.9);
        assert_eq!(weather_factor(Some("hail")), 0.3);
        assert_eq!(weather_factor(None), 0.3);
        assert_eq!(location_factor(Some("rural")), 0.2);
        assert_eq!(location_factor(Some("airport")), 0.5);
    }

    #[test]
    fn categories_follow_thresholds() {
        assert_eq!(risk_category(0.8), Severity::Critical);
        assert_eq!(risk_category(0.79), Severity::High);
        assert_eq!(risk_category(0.6), Severity::High);
        assert_eq!(risk_category(0.4), Severity::Medium);
        assert_eq!(risk_category(0.39), Severity::Low);
    }

    #[test]
    fn recommendations_cap_at_five() {
        let factors = RiskFactors {
            traffic_density: 0.9,
            time_of_day: 0.9,
            weather: 0.9,
            location_type: 0.7,
            historical_accidents: 0.0,
        };
        let lines = recommendations(0.95, &factors);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Dispatch emergency response team");
        assert!(recommendations(0.2, &RiskFactors { weather: 0.1, traffic_density: 0.1, ..factors }).is_empty());
    }

    #[test]
    fn rush_hour_is_read_from_local_time() {
        let morning = Local
            .with_ymd_and_hms(2024, 3, 1, 7, 30, 0)
            .earliest()
            .expect("local morning")
            .timestamp_millis() as EpochMillis;
        let factors = RiskFactors::derive(&RiskFeatures::default(), morning);
        assert_eq!(factors.time_of_day, 0.8);
    }

    #[test]
    fn prepared_features_fill_defaults() {
        let prepared = ModelFeatures::prepare(&RiskFeatures::default(), local_noon_friday());
        assert_eq!(prepared.time_of_day, 12);
        assert_eq!(prepared.day_of_week, 5);
        assert_eq!(prepared.weather_condition, "clear");
        assert_eq!(prepared.location_lat, DEFAULT_LATITUDE);
        assert_eq!(prepared.avg_speed, 60.0);
    }
}
