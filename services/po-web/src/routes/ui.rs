use actix_web::{HttpResponse, get, web};

use crate::routes::common::{html, po_error};
use crate::state::AppState;

#[get("/")]
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let orchestrator = &state.orchestrator;
    let tabs = orchestrator.tabs();
    let current = tabs.current().await;
    let pane = match tabs.content(current).await {
        Ok(html) => html,
        Err(err) => return po_error(err),
    };
    let view = po_dashboard::TabView {
        tab: current,
        name: current.name(),
        html: pane,
    };
    let menu = tabs.menu().await;
    match orchestrator.ui().render_index(&menu, &view).await {
        Ok(body) => html(body),
        Err(err) => po_error(err),
    }
}
