// Auth Gateway - main.rs
// web-server/src/main.rs
mod api;
mod forwarder;
mod handoff;
mod middleware;
mod static_files;
mod token_cache;
mod upstream;
mod utils;


use actix_web::{middleware::{Compress, Condition}, web, App, HttpServer};
use common::{setup_tracing, Config};
use std::sync::Arc;
use api::health::StartedAt;
use forwarder::AuthForwarder;
use middleware::RateLimiter;
use token_cache::{AdminTokenCache, CredentialStore};
use upstream::UpstreamClient;

/// Register every route and the shared state they need
pub fn configure_app(
    cfg: &mut web::ServiceConfig,
    config: web::Data<Config>,
    forwarder: web::Data<AuthForwarder>,
    started: web::Data<StartedAt>,
) {
    let static_config = static_files::StaticFilesConfig::from(&config.static_files);
    let json_limit = config.server.json_limit;

    cfg.app_data(config)
        .app_data(forwarder)
        .app_data(started)
        .app_data(api::json_config(json_limit))
        .configure(api::configure)
        .configure(handoff::configure)
        // Static files last: they answer every remaining path
        .configure(|cfg| static_files::configure(cfg, static_config));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();
    let server_addr = config.bind_addr();

    match config.upstream.url.as_deref() {
        Some(url) => tracing::info!("Upstream URL: {}", url),
        None => tracing::warn!("No upstream URL configured, login runs in demo mode"),
    }

    let upstream = Arc::new(
        UpstreamClient::from_config(&config.upstream)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
    );
    let token_cache = Arc::new(AdminTokenCache::new(upstream.clone(), &config.upstream));

    // Obtain the admin token in the background; the server starts regardless
    let init_cache = token_cache.clone();
    actix_web::rt::spawn(async move {
        init_cache.initialize().await;
    });

    let store: Arc<dyn CredentialStore> = token_cache;
    let forwarder = web::Data::new(AuthForwarder::new(upstream, store, &config.upstream));
    let started = web::Data::new(StartedAt::now());

    // Limiters are shared across workers
    let general_limiter =
        RateLimiter::general(&config.rate_limit).with_trust_proxy(config.server.trust_proxy);
    let auth_limiter =
        RateLimiter::auth(&config.rate_limit).with_trust_proxy(config.server.trust_proxy);

    tracing::info!("Starting auth gateway on {}", server_addr);

    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        let config = config_data.get_ref();

        App::new()
            .configure(|cfg| {
                configure_app(cfg, config_data.clone(), forwarder.clone(), started.clone())
            })
            .wrap(auth_limiter.clone())
            .wrap(general_limiter.clone())
            .wrap(Condition::new(config.static_files.enable_compression, Compress::default()))
            .wrap(middleware::security_headers(config.upstream.url.as_deref()))
            .wrap(middleware::cors(&config.cors))
    })
    .bind(&server_addr)?
    .run()
    .await
}
