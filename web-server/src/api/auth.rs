// web-server/src/api/auth.rs
use actix_web::{get, post, http::header, web, HttpRequest, HttpResponse};
use common::{models::AuthRequest, Config};
use crate::forwarder::{AuthForwarder, ForwardError, RequestContext};

// Register a new upstream account; it stays pending until approved
#[post("/register")]
pub async fn register(
    req: HttpRequest,
    body: web::Json<AuthRequest>,
    forwarder: web::Data<AuthForwarder>,
) -> Result<HttpResponse, ForwardError> {
    let ctx = RequestContext::from_request(&req);
    let result = forwarder.register(body.into_inner(), &ctx).await?;
    Ok(HttpResponse::Ok().json(result))
}

// Sign in against the upstream, or fall back to demo mode
#[post("/login")]
pub async fn login(
    req: HttpRequest,
    body: web::Json<AuthRequest>,
    forwarder: web::Data<AuthForwarder>,
) -> Result<HttpResponse, ForwardError> {
    let ctx = RequestContext::from_request(&req);
    let result = forwarder.login(body.into_inner(), &ctx).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/redirect-to-upstream")]
pub async fn redirect_to_upstream(config: web::Data<Config>) -> HttpResponse {
    let target = config
        .upstream
        .url
        .as_deref()
        .unwrap_or(&config.upstream.demo_redirect_url);

    HttpResponse::Found()
        .insert_header((header::LOCATION, target))
        .finish()
}
