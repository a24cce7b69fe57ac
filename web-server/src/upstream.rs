// web-server/src/upstream.rs
// HTTP client for the upstream chat platform
use common::UpstreamConfig;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const SIGNIN_PATH: &str = "/api/v1/auths/signin";
pub const SIGNUP_PATH: &str = "/api/v1/auths/signup";
pub const ME_PATH: &str = "/api/v1/auths/me";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream URL is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream answered with status {0}")]
    Status(StatusCode),
}

/// Status and decoded JSON body of an upstream call
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Human-readable error detail, when the upstream sent one
    pub fn detail(&self) -> Option<&str> {
        self.body.get("detail").and_then(Value::as_str)
    }

    pub fn session_token(&self) -> Option<String> {
        session_token(&self.body)
    }
}

/// Pull the session token out of a sign-in body.
///
/// Compatibility shim: accepts both `token` and `access_token`, and `token`
/// wins when both are present.
pub fn session_token(body: &Value) -> Option<String> {
    ["token", "access_token"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

pub struct UpstreamClient {
    http_client: Client,
    base_url: Option<String>,
    probe_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        base_url: Option<String>,
        probe_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("auth-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            probe_timeout,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.probe_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn build_url(&self, path: &str) -> Result<String, UpstreamError> {
        let base = self.base_url.as_deref().ok_or(UpstreamError::NotConfigured)?;
        Ok(format!("{}{}", base, path))
    }

    /// Lightweight reachability check against the upstream root.
    ///
    /// Succeeds only on a 2xx answer within the probe timeout.
    pub async fn probe(&self) -> Result<(), UpstreamError> {
        let url = self.build_url("/")?;

        let response = self
            .http_client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(UpstreamError::Status(response.status()))
        }
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<UpstreamReply, UpstreamError> {
        self.post_json(SIGNIN_PATH, &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.post_json(
            SIGNUP_PATH,
            &json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<UpstreamReply, UpstreamError> {
        let url = self.build_url(path)?;

        let response = self.http_client.post(&url).json(body).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        tracing::debug!("POST {} -> {}", path, status);
        Ok(UpstreamReply { status, body })
    }
}
