use po_config::ServiceConfig;
use po_dashboard::Orchestrator;

pub struct AppState {
    pub config: ServiceConfig,
    pub orchestrator: Orchestrator,
}
