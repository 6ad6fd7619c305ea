mod routes;
mod state;

use actix_web::{App, HttpServer, web};
use po_config::{AppSettings, ServiceConfig};
use po_core::{RandomSource, SeededRandom};
use po_dashboard::Orchestrator;
use po_observability::{ObservabilityConfig, init, log_startup};
use po_storage::{FileStore, KeyValueStore};
use state::AppState;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServiceConfig::from_env("po-web");
    let obs_config = ObservabilityConfig {
        service_name: config.service_name.clone(),
        environment: config.environment.to_string(),
        log_level: config.log_level.clone(),
        metrics_addr: config.metrics_addr.clone(),
    };
    let handle = init(&obs_config);
    log_startup(&handle, &obs_config.environment);

    let storage: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.data_dir)
            .await
            .map_err(|err| io::Error::other(err.message))?,
    );
    let rng: Arc<dyn RandomSource> = Arc::new(SeededRandom::from_entropy());
    let orchestrator = Orchestrator::new(AppSettings::from_env(), storage, rng)
        .map_err(|err| io::Error::other(err.message))?;
    let ready = orchestrator.init().await;
    tracing::info!(state = ?ready, data_dir = %config.data_dir, "orchestrator initialized");

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState {
        config,
        orchestrator: orchestrator.clone(),
    });

    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await;

    orchestrator.save_state().await;
    orchestrator.shutdown().await;
    result
}
