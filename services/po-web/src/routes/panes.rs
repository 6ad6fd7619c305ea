use actix_web::{HttpResponse, get, web};

use crate::routes::common::{html, po_error};
use crate::state::AppState;

/// Activates a pane and returns its markup for the `#pane` container.
#[get("/panes/{tab}")]
pub async fn pane(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let tab_id = path.into_inner();
    match state.orchestrator.switch_tab(&tab_id).await {
        Ok(view) => html(view.html),
        Err(err) => po_error(err),
    }
}
