// common/src/models/auth.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrator credential held by the gateway's token cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredential {
    /// Opaque upstream session token
    pub token: String,
    /// When the credential stops being trusted. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AdminCredential {
    /// Credential obtained from a sign-in, valid for `ttl`
    pub fn issued(token: String, ttl: chrono::Duration) -> Self {
        Self {
            token,
            expires_at: Some(Utc::now() + ttl),
        }
    }

    /// Credential taken verbatim from configuration
    pub fn permanent(token: String) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    /// Check if the credential is still usable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Credentials posted by the browser to /api/register and /api/login
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body returned to the browser for every register/login call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_mode: Option<bool>,
    /// Upstream error payload, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl ForwardResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            status: None,
            redirect_url: None,
            token: None,
            demo_mode: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    /// Registration accepted; accounts always start out pending approval
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            status: Some("pending".to_string()),
            ..Self::success(message)
        }
    }

    /// Login answered without contacting the upstream's sign-in
    pub fn demo(message: impl Into<String>, redirect_url: impl Into<String>) -> Self {
        Self {
            redirect_url: Some(redirect_url.into()),
            demo_mode: Some(true),
            ..Self::success(message)
        }
    }

    pub fn with_error(mut self, payload: serde_json::Value) -> Self {
        self.error = Some(payload);
        self
    }
}

/// Response structure for GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the process started
    pub uptime: f64,
    pub version: String,
}
