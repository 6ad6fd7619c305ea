use actix_web::{HttpResponse, get, web};
use po_dashboard::Partial;

use crate::routes::common::{html, po_error};
use crate::state::AppState;

#[get("/partials/{name}")]
pub async fn partial(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let partial = match path.parse::<Partial>() {
        Ok(partial) => partial,
        Err(err) => return po_error(err),
    };
    match state.orchestrator.ui().render_partial(partial).await {
        Ok(body) => html(body),
        Err(err) => po_error(err),
    }
}
