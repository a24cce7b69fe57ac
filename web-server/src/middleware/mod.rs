// web-server/src/middleware/mod.rs
pub mod rate_limiter;

use actix_cors::Cors;
use actix_web::{http::header, middleware::DefaultHeaders};
use common::CorsConfig;
use url::Url;

pub use rate_limiter::RateLimiter;

/// Content Security Policy for everything the gateway serves.
///
/// The upstream origin is added to `connect-src` so the handoff page can
/// verify the token against it.
pub fn content_security_policy(upstream_url: Option<&str>) -> String {
    let upstream_origin = upstream_url
        .and_then(|url| Url::parse(url).ok())
        .map(|url| url.origin().ascii_serialization())
        .filter(|origin| origin != "null");

    let connect_src = match upstream_origin {
        Some(origin) => format!("'self' {}", origin),
        None => "'self'".to_string(),
    };

    [
        "default-src 'self'".to_string(),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "script-src 'self' 'unsafe-inline'".to_string(),
        "img-src 'self' data: https:".to_string(),
        format!("connect-src {}", connect_src),
        "font-src 'self'".to_string(),
        "object-src 'none'".to_string(),
        "media-src 'self'".to_string(),
        "frame-src 'none'".to_string(),
    ]
    .join("; ")
}

/// Security headers added to every response
pub fn security_headers(upstream_url: Option<&str>) -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::CONTENT_SECURITY_POLICY, content_security_policy(upstream_url)))
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .add((header::REFERRER_POLICY, "no-referrer"))
        .add(("Cross-Origin-Opener-Policy", "same-origin"))
}

/// CORS with credentials. Without a configured list every origin is reflected.
pub fn cors(config: &CorsConfig) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    if config.allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }

    config
        .allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
