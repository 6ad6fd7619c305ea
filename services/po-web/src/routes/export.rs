use actix_web::{HttpResponse, get, web};

use crate::routes::common::po_error;
use crate::state::AppState;

/// Full data export as a downloadable JSON attachment.
#[get("/export")]
pub async fn export(state: web::Data<AppState>) -> HttpResponse {
    match state.orchestrator.export_data().await {
        Ok(file) => HttpResponse::Ok()
            .content_type("application/json")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", file.filename),
            ))
            .body(file.body),
        Err(err) => po_error(err),
    }
}
