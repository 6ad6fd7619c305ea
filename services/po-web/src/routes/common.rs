use actix_web::HttpResponse;
use po_core::{ErrorCode, PoError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: message.into(),
    })
}

/// Maps an orchestrator error onto its HTTP status.
pub fn po_error(err: PoError) -> HttpResponse {
    let body = ErrorResponse { error: err.message };
    match err.code {
        ErrorCode::InvalidInput => HttpResponse::BadRequest().json(body),
        ErrorCode::NotFound => HttpResponse::NotFound().json(body),
        ErrorCode::Conflict => HttpResponse::Conflict().json(body),
        ErrorCode::Timeout => HttpResponse::GatewayTimeout().json(body),
        ErrorCode::Unavailable => HttpResponse::ServiceUnavailable().json(body),
        ErrorCode::Upstream => HttpResponse::BadGateway().json(body),
        ErrorCode::Storage | ErrorCode::Internal => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

pub fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}
