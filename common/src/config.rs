// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,

    // Static file serving configuration
    pub static_files: StaticFilesConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted JSON body, in bytes
    pub json_limit: usize,
    /// Attribute requests to `X-Forwarded-For` / `Forwarded` instead of the
    /// socket peer. Only enable behind a reverse proxy that sets them.
    pub trust_proxy: bool,
}

/// Where the upstream lives and how the gateway authenticates against it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream. `None` (or empty) puts login into demo mode.
    pub url: Option<String>,
    pub admin_email: String,
    pub admin_password: String,
    /// Static admin token; adopted as-is and never expires
    pub jwt_token: Option<String>,
    pub api_key: Option<String>,
    /// Where the browser is sent when no upstream is configured
    pub demo_redirect_url: String,
    /// Answer with demo-mode success when the upstream cannot be reached.
    /// When false, login reports 503 instead.
    pub demo_fallback: bool,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub admin_token_ttl_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Empty means any origin is reflected back
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: usize,
    pub auth_max_requests: usize,
    /// Requests allowed in a window before slow-down kicks in
    pub delay_after: usize,
    pub delay_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    pub path: String,
    pub index: String,
    pub enable_compression: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                json_limit: 10 * 1024 * 1024,
                trust_proxy: false,
            },
            upstream: UpstreamConfig {
                url: Some("http://localhost:3000".to_string()),
                admin_email: "admin@localhost".to_string(),
                admin_password: "admin123".to_string(),
                jwt_token: None,
                api_key: None,
                demo_redirect_url: "http://localhost:3000".to_string(),
                demo_fallback: true,
                probe_timeout_secs: 5,
                request_timeout_secs: 30,
                admin_token_ttl_secs: 3600,
            },
            cors: CorsConfig {
                allowed_origins: Vec::new(),
            },
            rate_limit: RateLimitConfig {
                window_secs: 15 * 60,
                max_requests: 100,
                auth_max_requests: 5,
                delay_after: 2,
                delay_ms: 500,
            },
            static_files: StaticFilesConfig {
                path: "./public".to_string(),
                index: "index.html".to_string(),
                enable_compression: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let mut config: Config = ConfigFile::builder()
            // Start with defaults
            .add_source(ConfigFile::try_from(&Config::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load from files and environment, falling back to defaults plus the plain
    /// environment variables when the layered load fails
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();
                config.apply_env_overrides(|key| env::var(key).ok());
                config
            }
        }
    }

    /// Apply the gateway's historical environment variables on top of the loaded
    /// values. An empty string clears an optional value.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OPENWEBUI_URL") {
            self.upstream.url = Some(url);
        }
        if let Some(email) = lookup("ADMIN_EMAIL").filter(|v| !v.is_empty()) {
            self.upstream.admin_email = email;
        }
        if let Some(password) = lookup("ADMIN_PASSWORD").filter(|v| !v.is_empty()) {
            self.upstream.admin_password = password;
        }
        if let Some(token) = lookup("OPENWEBUI_JWT_TOKEN") {
            self.upstream.jwt_token = Some(token);
        }
        if let Some(key) = lookup("OPENWEBUI_API_KEY") {
            self.upstream.api_key = Some(key);
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(trust) = lookup("TRUST_PROXY") {
            self.server.trust_proxy = matches!(trust.trim(), "1" | "true" | "TRUE" | "True");
        }
        if let Some(path) = lookup("STATIC_FILES_PATH").filter(|v| !v.is_empty()) {
            self.static_files.path = path;
        }

        self.normalize();
    }

    fn normalize(&mut self) {
        fn clean(value: &mut Option<String>) {
            if value.as_deref().map(str::trim).map_or(false, str::is_empty) {
                *value = None;
            }
        }

        clean(&mut self.upstream.url);
        clean(&mut self.upstream.jwt_token);
        clean(&mut self.upstream.api_key);

        if let Some(url) = self.upstream.url.as_mut() {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
