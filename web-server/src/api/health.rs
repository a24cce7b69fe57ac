// web-server/src/api/health.rs
use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use common::models::HealthResponse;
use std::time::Instant;

/// Moment the server started, for uptime reporting
#[derive(Debug, Clone, Copy)]
pub struct StartedAt(pub Instant);

impl StartedAt {
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

#[get("/health")]
pub async fn health(started: web::Data<StartedAt>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: started.0.elapsed().as_secs_f64(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
