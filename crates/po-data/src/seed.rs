use po_core::{
    Alert, AlertId, AlertStatus, EpochMillis, Protocol, ProtocolId, Resource, ResourceId,
    ResourceKind, ResourceStatus, Severity,
};

fn alert(
    id: &str,
    time: &str,
    alert_type: &str,
    protocol: &str,
    location: &str,
    severity: Severity,
    confidence: f64,
    description: &str,
    created_at_ms: EpochMillis,
) -> Alert {
    Alert {
        id: AlertId::from(id),
        created_at_ms,
        time: time.to_string(),
        alert_type: alert_type.to_string(),
        protocol: ProtocolId::from(protocol),
        location: location.to_string(),
        severity,
        confidence,
        status: AlertStatus::Active,
        description: description.to_string(),
    }
}

pub fn sample_alerts(now_ms: EpochMillis) -> Vec<Alert> {
    vec![
        alert(
            "alert-001",
            "14:30:22",
            "Speed Violation",
            "SP-001",
            "M1 Highway, KM 12.5",
            Severity::High,
            0.92,
            "Multiple vehicles exceeding speed limit by 40+ km/h",
            now_ms,
        ),
        alert(
            "alert-002",
            "14:25:15",
            "Lane Departure",
            "LD-003",
            "N1 Northbound, KM 8.2",
            Severity::Medium,
            0.85,
            "Commercial vehicle drifting between lanes",
            now_ms,
        ),
        alert(
            "alert-003",
            "14:15:42",
            "Congestion",
            "CG-002",
            "CBD Intersection",
            Severity::Low,
            0.78,
            "Traffic buildup exceeding 1km",
            now_ms,
        ),
        alert(
            "alert-004",
            "13:45:18",
            "Weather Hazard",
            "WH-004",
            "M2 Eastbound",
            Severity::High,
            0.95,
            "Heavy rainfall reducing visibility",
            now_ms,
        ),
        alert(
            "alert-005",
            "13:30:55",
            "Accident Detection",
            "AD-001",
            "R24 Highway",
            Severity::Critical,
            0.98,
            "Two-vehicle collision detected",
            now_ms,
        ),
    ]
}

fn resource(id: &str, name: &str, kind: ResourceKind, status: ResourceStatus, location: &str) -> Resource {
    Resource {
        id: ResourceId::from(id),
        name: name.to_string(),
        kind,
        status,
        location: location.to_string(),
        capacity: None,
        battery: None,
        members: None,
        last_check: None,
        message: None,
    }
}

pub fn sample_resources() -> Vec<Resource> {
    use ResourceKind::*;
    use ResourceStatus::*;

    vec![
        Resource {
            capacity: Some(4),
            ..resource("res-001", "Patrol Unit A1", Vehicle, Available, "Zone 1")
        },
        Resource {
            last_check: Some("14:25".into()),
            ..resource("res-002", "Traffic Camera 12", Camera, Active, "M1-12.5")
        },
        Resource {
            members: Some(3),
            ..resource("res-003", "Response Team B", Team, Available, "HQ")
        },
        Resource {
            battery: Some(45),
            ..resource("res-004", "Drone Unit 3", Drone, Charging, "Station 2")
        },
        Resource {
            message: Some("Speed Limit 80".into()),
            ..resource("res-005", "Variable Signs 8", Sign, Active, "N1-8.2")
        },
        Resource {
            capacity: Some(3),
            ..resource("res-006", "Patrol Unit C2", Vehicle, OnDuty, "Zone 3")
        },
        Resource {
            last_check: Some("13:45".into()),
            ..resource("res-007", "Traffic Camera 45", Camera, Maintenance, "CBD-5")
        },
        Resource {
            members: Some(4),
            ..resource("res-008", "Response Team D", Team, Available, "Substation")
        },
    ]
}

pub fn sample_protocols() -> Vec<Protocol> {
    [
        ("SP-001", "Speed Enforcement", 92.0, "14:30", 45),
        ("LD-003", "Lane Discipline", 87.0, "14:25", 28),
        ("CG-002", "Congestion Management", 78.0, "14:15", 62),
        ("WH-004", "Weather Response", 95.0, "13:45", 15),
        ("AD-001", "Accident Response", 88.0, "13:30", 12),
    ]
    .into_iter()
    .map(|(id, name, effectiveness, last_used, triggers)| Protocol {
        id: ProtocolId::from(id),
        name: name.to_string(),
        effectiveness,
        last_used: last_used.to_string(),
        triggers,
    })
    .collect()
}

/// Alert archetypes used by the random trigger generator.
pub(crate) const ALERT_TEMPLATES: [(&str, &str, Severity); 5] = [
    ("Speed Violation", "SP-001", Severity::High),
    ("Lane Departure", "LD-003", Severity::Medium),
    ("Congestion", "CG-002", Severity::Low),
    ("Weather Hazard", "WH-004", Severity::High),
    ("Accident Detection", "AD-001", Severity::Critical),
];
