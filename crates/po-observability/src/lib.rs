use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

pub const ALERTS_CREATED_TOTAL: &str = "po_alerts_created_total";
pub const ALERTS_ESCALATED_TOTAL: &str = "po_alerts_escalated_total";
pub const SCENARIOS_RUN_TOTAL: &str = "po_scenarios_run_total";
pub const PREDICTIONS_TOTAL: &str = "po_predictions_total";
pub const TRAINING_RUNS_TOTAL: &str = "po_training_runs_total";
pub const NOTIFICATIONS_TOTAL: &str = "po_notifications_total";
pub const PERSIST_FAILURES_TOTAL: &str = "po_persist_failures_total";
pub const ACTIVE_ALERTS: &str = "po_active_alerts";

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObservabilityHandle {
    pub service_name: String,
    pub metrics_enabled: bool,
}

/// Quiet dependencies, `info` for the service binary and the dashboard crates.
pub fn default_directives(service_name: &str) -> String {
    let service = service_name.replace('-', "_");
    format!("warn,{service}=info,po_dashboard=info,po_data=info,po_simulation=info,po_prediction=info")
}

fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    let fallback = || EnvFilter::new(default_directives(&config.service_name));
    if config.log_level.trim().is_empty() {
        return fallback();
    }
    EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| fallback())
}

pub fn init(config: &ObservabilityConfig) -> ObservabilityHandle {
    let filter = env_filter(config);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);

    let metrics_enabled = init_metrics(config);
    if metrics_enabled {
        describe_metrics();
    }

    ObservabilityHandle {
        service_name: config.service_name.clone(),
        metrics_enabled,
    }
}

pub fn log_startup(handle: &ObservabilityHandle, environment: &str) {
    tracing::info!(
        service = %handle.service_name,
        environment = %environment,
        metrics_enabled = handle.metrics_enabled,
        "Prevention Orchestrator service starting"
    );
}

fn describe_metrics() {
    metrics::describe_counter!(ALERTS_CREATED_TOTAL, "Alerts added to the data store");
    metrics::describe_counter!(ALERTS_ESCALATED_TOTAL, "Alert escalations");
    metrics::describe_counter!(SCENARIOS_RUN_TOTAL, "Scenario simulations run");
    metrics::describe_counter!(PREDICTIONS_TOTAL, "Risk predictions served");
    metrics::describe_counter!(TRAINING_RUNS_TOTAL, "Completed training runs");
    metrics::describe_counter!(NOTIFICATIONS_TOTAL, "Notifications shown");
    metrics::describe_counter!(PERSIST_FAILURES_TOTAL, "Swallowed persistence failures");
    metrics::describe_gauge!(ACTIVE_ALERTS, "Alerts currently in the active state");
}

fn init_metrics(config: &ObservabilityConfig) -> bool {
    let Some(addr) = config.metrics_addr.as_ref() else {
        return false;
    };
    let addr: SocketAddr = match addr.parse() {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                error = %err,
                "Invalid PO_METRICS_ADDR value"
            );
            return false;
        }
    };

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .add_global_label("environment", config.environment.clone());

    match builder.install() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                service = %config.service_name,
                error = %err,
                "Failed to initialize Prometheus exporter"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_level: &str) -> ObservabilityConfig {
        ObservabilityConfig {
            service_name: "po-web".to_string(),
            environment: "local".to_string(),
            log_level: log_level.to_string(),
            metrics_addr: None,
        }
    }

    #[test]
    fn default_directives_name_the_service_crate() {
        let directives = default_directives("po-web");
        assert!(directives.contains("po_web=info"));
        assert!(directives.starts_with("warn,"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn empty_or_invalid_level_uses_service_defaults() {
        assert!(env_filter(&config("")).to_string().contains("po_web=info"));
        assert!(env_filter(&config("po_web=loud")).to_string().contains("po_dashboard=info"));
        assert!(env_filter(&config("debug")).to_string().contains("debug"));
    }
}
