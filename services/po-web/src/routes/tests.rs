use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use po_config::{AppSettings, ServiceConfig};
use po_core::FixedRandom;
use po_dashboard::Orchestrator;
use po_storage::MemoryStore;
use std::sync::Arc;

use super::configure;
use crate::state::AppState;

async fn state() -> web::Data<AppState> {
    let mut settings = AppSettings::for_tests();
    settings.simulation.enabled = false;
    let orchestrator = Orchestrator::new(
        settings,
        Arc::new(MemoryStore::new()),
        Arc::new(FixedRandom::constant(0.5)),
    )
    .expect("orchestrator");
    orchestrator.init().await;
    web::Data::new(AppState {
        config: ServiceConfig::from_env("po-web-test"),
        orchestrator,
    })
}

macro_rules! service {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(configure)).await
    };
}

#[actix_web::test]
async fn health_reports_ok() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn index_renders_menu_and_current_pane() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("/panes/alerts"));
    assert!(body.contains("/ui/stream/sse"));
}

#[actix_web::test]
async fn logout_button_asks_for_confirmation() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let body = String::from_utf8_lossy(&body);
    let start = body.find("id=\"logout-btn\"").expect("logout button");
    let button = &body[start..start + body[start..].find('>').expect("tag end")];
    assert!(button.contains("hx-post=\"/actions/logout\""));
    assert!(button.contains(
        "hx-confirm=\"Are you sure you want to logout? All unsaved data will be lost.\""
    ));
}

#[actix_web::test]
async fn switching_panes_moves_the_router() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get().uri("/panes/simulation").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.orchestrator.tabs().current().await.id(), "simulation");

    let req = test::TestRequest::get().uri("/panes/nowhere").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(state.orchestrator.tabs().current().await.id(), "simulation");
}

#[actix_web::test]
async fn partials_render_or_404() {
    let state = state().await;
    let app = service!(state);
    for name in ["stats", "alerts", "resources", "protocols", "notifications"] {
        let req = test::TestRequest::get()
            .uri(&format!("/partials/{name}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "partial {name}");
    }
    let req = test::TestRequest::get().uri("/partials/missing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn emergency_toggle_round_trips() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::post().uri("/actions/emergency").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["emergency_mode"], true);
    assert!(state.orchestrator.is_emergency());

    let req = test::TestRequest::post()
        .uri("/actions/emergency?enabled=false")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["emergency_mode"], false);
}

#[actix_web::test]
async fn escalating_unknown_alert_is_404() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::post()
        .uri("/actions/alerts/ALT-missing/escalate")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn acknowledge_all_counts_active_alerts() {
    let state = state().await;
    let app = service!(state);
    let active = state.orchestrator.data().active_alerts().await.len();
    let req = test::TestRequest::post()
        .uri("/actions/alerts/acknowledge-all")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], active);
    assert!(state.orchestrator.data().active_alerts().await.is_empty());
}

#[actix_web::test]
async fn scenario_routes_prefer_fixed_paths() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::post()
        .uri("/actions/scenarios/run-all")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["summary"]["total"].as_u64().unwrap_or(0) > 0);

    let req = test::TestRequest::post()
        .uri("/actions/scenarios/clear-history")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(state.orchestrator.simulator().history().await.is_empty());

    let req = test::TestRequest::post()
        .uri("/actions/scenarios/volcano")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_map_layer_is_404() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::post()
        .uri("/actions/map/layers/weather")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/actions/map/zoom")
        .set_form([("city", " ")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn chart_follows_requested_period() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get()
        .uri("/ui/chart?period=24h")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["period"], "24h");
    assert_eq!(body["labels"].as_array().map(Vec::len), Some(24));
}

#[actix_web::test]
async fn export_is_an_attachment() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get().uri("/export").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get("Content-Disposition")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"prevention-orchestrator-export-"));
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["alerts"].is_array());
}

#[actix_web::test]
async fn status_reports_ready_modules() {
    let state = state().await;
    let app = service!(state);
    let req = test::TestRequest::get().uri("/ui/status").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "ready");
    assert_eq!(body["modules"]["data"], true);
}
