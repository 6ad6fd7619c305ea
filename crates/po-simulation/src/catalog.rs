use po_core::{ExpectedOutcomes, ScenarioParameters};
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: ScenarioParameters,
    pub expected_outcomes: ExpectedOutcomes,
}

static CATALOG: LazyLock<Vec<Scenario>> = LazyLock::new(|| {
    vec![
        Scenario {
            key: "rush_hour",
            name: "Rush Hour",
            description: "Simulate peak traffic conditions during morning/evening commute",
            parameters: ScenarioParameters {
                traffic_density: Some(95.0),
                avg_speed: Some(35.0),
                accident_probability: Some(0.15),
                vehicle_count: Some(250),
                duration: Some("2 hours".into()),
                time_of_day: Some("07:00-09:00".into()),
                ..ScenarioParameters::default()
            },
            expected_outcomes: outcomes("65-75%", "6-8s", "85-90%"),
        },
        Scenario {
            key: "school_zone",
            name: "School Zone",
            description: "Simulate school zone safety during peak hours",
            parameters: ScenarioParameters {
                pedestrian_density: Some(80.0),
                vehicle_speed: Some(30.0),
                crosswalk_activity: Some("high".into()),
                school_hours: Some(true),
                parent_dropoff: Some(true),
                ..ScenarioParameters::default()
            },
            expected_outcomes: outcomes("70-80%", "5-7s", "90-95%"),
        },
        Scenario {
            key: "weekend_night",
            name: "Weekend Night",
            description: "Simulate weekend night traffic with potential DUI risks",
            parameters: ScenarioParameters {
                time_of_day: Some("22:00-04:00".into()),
                alcohol_risk: Some("elevated".into()),
                speed_variation: Some("high".into()),
                enforcement_presence: Some("reduced".into()),
                ..ScenarioParameters::default()
            },
            expected_outcomes: outcomes("60-70%", "8-10s", "80-85%"),
        },
        Scenario {
            key: "weather_emergency",
            name: "Weather Emergency",
            description: "Simulate extreme weather conditions impact on road safety",
            parameters: ScenarioParameters {
                weather_condition: Some("heavy_rain".into()),
                visibility: Some("low".into()),
                road_condition: Some("slippery".into()),
                wind_speed: Some("high".into()),
                ..ScenarioParameters::default()
            },
            expected_outcomes: outcomes("75-85%", "7-9s", "88-92%"),
        },
        Scenario {
            key: "highway_accident",
            name: "Highway Accident",
            description: "Simulate multi-vehicle accident on major highway",
            parameters: ScenarioParameters {
                vehicles_involved: Some(3),
                lane_closures: Some(2),
                emergency_response: Some("required".into()),
                traffic_backup: Some("severe".into()),
                ..ScenarioParameters::default()
            },
            expected_outcomes: outcomes("80-90%", "4-6s", "92-96%"),
        },
    ]
});

fn outcomes(risk_reduction: &str, response_time: &str, protocol_effectiveness: &str) -> ExpectedOutcomes {
    ExpectedOutcomes {
        risk_reduction: risk_reduction.to_string(),
        response_time: response_time.to_string(),
        protocol_effectiveness: protocol_effectiveness.to_string(),
    }
}

/// The fixed scenario catalog, in display order.
pub fn scenarios() -> &'static [Scenario] {
    &CATALOG
}

pub fn find(key: &str) -> Option<&'static Scenario> {
    CATALOG.iter().find(|scenario| scenario.key == key)
}

/// Additive risk-reduction bonus from scenario parameters.
pub(crate) fn risk_adjustment(parameters: &ScenarioParameters) -> f64 {
    let mut adjustment = 0.0;
    if parameters.traffic_density.is_some_and(|density| density > 90.0) {
        adjustment += 0.05;
    }
    if parameters.pedestrian_density.is_some_and(|density| density > 70.0) {
        adjustment += 0.08;
    }
    if parameters.weather_condition.as_deref() == Some("heavy_rain") {
        adjustment += 0.10;
    }
    if parameters.vehicles_involved.is_some_and(|count| count > 2) {
        adjustment += 0.12;
    }
    adjustment
}

pub(crate) fn response_adjustment(parameters: &ScenarioParameters) -> f64 {
    let mut adjustment = 0.0;
    if parameters.accident_probability.is_some_and(|probability| probability > 0.1) {
        adjustment -= 1.0;
    }
    if parameters.enforcement_presence.as_deref() == Some("reduced") {
        adjustment += 2.0;
    }
    if parameters.emergency_response.as_deref() == Some("required") {
        adjustment -= 0.5;
    }
    adjustment
}

pub(crate) fn recommendations(parameters: &ScenarioParameters, risk_percent: f64) -> Vec<String> {
    let mut lines: Vec<&str> = if risk_percent >= 80.0 {
        vec![
            "Excellent risk reduction - protocol highly effective",
            "Consider deploying this strategy in real situations",
        ]
    } else if risk_percent >= 70.0 {
        vec![
            "Good performance - minor optimizations needed",
            "Review response time for further improvements",
        ]
    } else {
        vec![
            "Performance needs improvement",
            "Analyze bottlenecks in response protocol",
        ]
    };

    if parameters.traffic_density.is_some_and(|density| density > 80.0) {
        lines.push("Implement dynamic lane management");
        lines.push("Adjust traffic signal coordination");
    }
    if parameters.pedestrian_density.is_some_and(|density| density > 60.0) {
        lines.push("Increase pedestrian crossing time");
        lines.push("Deploy additional crossing guards");
    }
    if parameters.weather_condition.as_deref() == Some("heavy_rain") {
        lines.push("Activate weather response protocol immediately");
        lines.push("Reduce speed limits by 30%");
    }

    lines.into_iter().take(5).map(str::to_string).collect()
}
