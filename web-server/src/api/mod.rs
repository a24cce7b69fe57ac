// web-server/src/api/mod.rs
pub mod auth;
pub mod health;

use actix_web::{error::{InternalError, JsonPayloadError}, web, HttpResponse};
use common::models::ForwardResult;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(auth::register)
            .service(auth::login)
            .service(auth::redirect_to_upstream)
    )
    .service(health::health);
}

/// JSON extractor settings: body size limit and a JSON error body
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            tracing::debug!("Rejected request body: {}", err);
            let response = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    HttpResponse::PayloadTooLarge().json(ForwardResult::failure("Request body too large"))
                }
                _ => HttpResponse::BadRequest().json(ForwardResult::failure("Invalid request body")),
            };
            InternalError::from_response(err, response).into()
        })
}
