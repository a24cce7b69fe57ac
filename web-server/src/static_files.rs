// web-server/src/static_files.rs
use actix_web::{web, HttpRequest, HttpResponse, Result, Error};
use actix_files::{Files, NamedFile};
use std::path::PathBuf;

// Configuration for static file serving
#[derive(Clone)]
pub struct StaticFilesConfig {
    pub root_path: PathBuf,
    pub index_file: String,
}

impl From<&common::StaticFilesConfig> for StaticFilesConfig {
    fn from(config: &common::StaticFilesConfig) -> Self {
        Self {
            root_path: PathBuf::from(&config.path),
            index_file: config.index.clone(),
        }
    }
}

// Paths owned by handlers; never answered with the index page
fn is_reserved(path: &str) -> bool {
    path.starts_with("/api/") || path.starts_with("/auth/") || path == "/health"
}

// Async handler function for unmatched routes
async fn index_fallback(req: HttpRequest, config: web::Data<StaticFilesConfig>) -> Result<HttpResponse, Error> {
    if is_reserved(req.path()) {
        return Ok(HttpResponse::NotFound().finish());
    }

    let index_path = config.root_path.join(&config.index_file);
    let file = NamedFile::open(index_path)?;
    Ok(file.into_response(&req))
}

// Configure static file serving. Register after every other route.
pub fn configure(cfg: &mut web::ServiceConfig, config: StaticFilesConfig) {
    let config_data = web::Data::new(config.clone());

    if !config.root_path.is_dir() {
        tracing::warn!("Static files directory {} not found", config.root_path.display());
    }

    cfg.app_data(config_data)
        .service(
            Files::new("/", &config.root_path)
                .index_file(&config.index_file)
                .prefer_utf8(true)
                .use_etag(true)
                .use_last_modified(true)
                // Unknown paths fall back to the index page
                .default_handler(web::route().to(index_fallback))
        );
}
