//! POST handlers behind the dashboard's buttons. Each returns the affected
//! record as JSON; the page itself refreshes from the event stream.

use actix_web::{HttpResponse, post, web};
use po_core::{AlertId, NotificationId, ResourceId};
use po_dashboard::Partial;
use serde::{Deserialize, Serialize};

use crate::routes::common::{bad_request, html, po_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmergencyQuery {
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
struct EmergencyResponse {
    emergency_mode: bool,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: usize,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    visible: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ZoomForm {
    pub city: String,
}

#[post("/actions/emergency")]
pub async fn emergency(
    state: web::Data<AppState>,
    query: web::Query<EmergencyQuery>,
) -> HttpResponse {
    let emergency_mode = state.orchestrator.toggle_emergency_mode(query.enabled).await;
    HttpResponse::Ok().json(EmergencyResponse { emergency_mode })
}

#[post("/actions/logout")]
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    state.orchestrator.logout().await;
    HttpResponse::Ok()
        .insert_header(("HX-Redirect", "/"))
        .json(StatusResponse {
            status: "logged_out",
        })
}

#[post("/actions/refresh")]
pub async fn refresh(state: web::Data<AppState>) -> HttpResponse {
    state.orchestrator.refresh_dashboard().await;
    HttpResponse::Ok().json(state.orchestrator.ui().view().await)
}

#[post("/actions/simulate-trigger")]
pub async fn simulate_trigger(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.simulate_new_trigger().await)
}

// Alerts

#[post("/actions/alerts/acknowledge-all")]
pub async fn acknowledge_all(state: web::Data<AppState>) -> HttpResponse {
    let count = state.orchestrator.acknowledge_all().await;
    HttpResponse::Ok().json(CountResponse { count })
}

#[post("/actions/alerts/clear-resolved")]
pub async fn clear_resolved(state: web::Data<AppState>) -> HttpResponse {
    let count = state.orchestrator.clear_resolved().await;
    HttpResponse::Ok().json(CountResponse { count })
}

#[post("/actions/alerts/{id}/escalate")]
pub async fn escalate_alert(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = AlertId::new(path.into_inner());
    match state.orchestrator.escalate_alert(&id).await {
        Ok(alert) => HttpResponse::Ok().json(alert),
        Err(err) => po_error(err),
    }
}

#[post("/actions/alerts/{id}/acknowledge")]
pub async fn acknowledge_alert(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = AlertId::new(path.into_inner());
    match state.orchestrator.acknowledge_alert(&id).await {
        Ok(alert) => HttpResponse::Ok().json(alert),
        Err(err) => po_error(err),
    }
}

// Resources

#[post("/actions/deploy")]
pub async fn deploy(state: web::Data<AppState>) -> HttpResponse {
    match state.orchestrator.deploy_resources().await {
        Ok(count) => HttpResponse::Ok().json(CountResponse { count }),
        Err(err) => po_error(err),
    }
}

#[post("/actions/optimize")]
pub async fn optimize(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.optimize_allocation().await)
}

#[post("/actions/resources/{id}/select")]
pub async fn select_resource(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = ResourceId::new(path.into_inner());
    match state.orchestrator.select_resource(&id).await {
        Ok(resource) => HttpResponse::Ok().json(resource),
        Err(err) => po_error(err),
    }
}

// Map

#[post("/actions/map/traffic")]
pub async fn toggle_traffic(state: web::Data<AppState>) -> HttpResponse {
    let visible = state.orchestrator.toggle_traffic().await;
    HttpResponse::Ok().json(ToggleResponse { visible })
}

#[post("/actions/map/layers/{layer}")]
pub async fn toggle_layer(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.orchestrator.toggle_layer(&path).await {
        Ok(visible) => HttpResponse::Ok().json(ToggleResponse { visible }),
        Err(err) => po_error(err),
    }
}

#[post("/actions/map/zoom")]
pub async fn zoom(state: web::Data<AppState>, form: web::Form<ZoomForm>) -> HttpResponse {
    let city = form.city.trim();
    if city.is_empty() {
        return bad_request("city is required");
    }
    HttpResponse::Ok().json(state.orchestrator.zoom_to_city(city).await)
}

// Playbook and scenarios

#[post("/actions/playbook/train")]
pub async fn train_playbook(state: web::Data<AppState>) -> HttpResponse {
    match state.orchestrator.train_playbook().await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(err) => po_error(err),
    }
}

#[post("/actions/playbook/reset")]
pub async fn reset_playbook(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.reset_playbook().await)
}

#[post("/actions/scenarios/run-all")]
pub async fn run_all_scenarios(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.run_all_scenarios().await)
}

#[post("/actions/scenarios/clear-history")]
pub async fn clear_history(state: web::Data<AppState>) -> HttpResponse {
    state.orchestrator.clear_simulation_history().await;
    HttpResponse::Ok().json(StatusResponse { status: "cleared" })
}

#[post("/actions/scenarios/{key}")]
pub async fn run_scenario(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.orchestrator.run_scenario(&path).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => po_error(err),
    }
}

// Notifications

/// Dismisses a toast and answers with the refreshed notification list.
#[post("/actions/notifications/{id}/dismiss")]
pub async fn dismiss_notification(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = NotificationId::new(path.into_inner());
    state.orchestrator.dismiss_notification(&id).await;
    match state
        .orchestrator
        .ui()
        .render_partial(Partial::Notifications)
        .await
    {
        Ok(body) => html(body),
        Err(err) => po_error(err),
    }
}
