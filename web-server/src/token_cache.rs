// web-server/src/token_cache.rs
use async_trait::async_trait;
use chrono::Utc;
use common::{models::AdminCredential, redact_token, UpstreamConfig};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use crate::upstream::UpstreamClient;

// Lifetime given to a freshly signed-in admin token (1 hour)
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Source of the administrator credential used against the upstream
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current admin token, refreshing it when the cached one has expired.
    /// `None` means no token could be obtained.
    async fn valid_token(&self) -> Option<String>;

    /// Whether any credential is cached right now, expired or not
    fn has_credential(&self) -> bool;
}

/// Caches a single admin credential, refreshed lazily by signing in again
pub struct AdminTokenCache {
    upstream: Arc<UpstreamClient>,
    admin_email: String,
    admin_password: String,
    static_token: Option<String>,
    ttl: chrono::Duration,
    credential: RwLock<Option<AdminCredential>>,
}

impl AdminTokenCache {
    pub fn new(upstream: Arc<UpstreamClient>, config: &UpstreamConfig) -> Self {
        let ttl_secs = if config.admin_token_ttl_secs == 0 {
            DEFAULT_TOKEN_TTL_SECS
        } else {
            config.admin_token_ttl_secs
        };

        Self {
            upstream,
            admin_email: config.admin_email.clone(),
            admin_password: config.admin_password.clone(),
            static_token: config.jwt_token.clone(),
            ttl: Self::chrono_ttl(Duration::from_secs(ttl_secs)),
            credential: RwLock::new(None),
        }
    }

    /// Override the lifetime given to signed-in tokens
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Self::chrono_ttl(ttl);
        self
    }

    fn chrono_ttl(ttl: Duration) -> chrono::Duration {
        chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    /// Populate the cache at start-up.
    ///
    /// A configured static token is adopted as-is. Otherwise one sign-in is
    /// attempted; failing it leaves the cache empty and the gateway keeps
    /// serving.
    pub async fn initialize(&self) {
        if let Some(token) = &self.static_token {
            self.replace(AdminCredential::permanent(token.clone()));
            tracing::info!("Admin token loaded from configuration");
            return;
        }

        match self.valid_token().await {
            Some(_) => tracing::info!("Admin token obtained via sign-in"),
            None => tracing::warn!("No admin token available, continuing without one"),
        }
    }

    fn cached(&self) -> Option<AdminCredential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, credential: AdminCredential) {
        *self.credential.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Sign in with the configured admin account. Every failure is "no token".
    async fn sign_in(&self) -> Option<String> {
        tracing::info!("Requesting admin token from upstream");

        let reply = match self.upstream.signin(&self.admin_email, &self.admin_password).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error getting admin token: {}", e);
                return None;
            }
        };

        if !reply.is_success() {
            tracing::error!("Failed to get admin token: {}", reply.status);
            return None;
        }

        match reply.session_token() {
            Some(token) => Some(token),
            None => {
                tracing::error!("Admin sign-in succeeded but carried no token");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialStore for AdminTokenCache {
    async fn valid_token(&self) -> Option<String> {
        if let Some(credential) = self.cached() {
            if credential.is_valid_at(Utc::now()) {
                return Some(credential.token);
            }
            tracing::debug!("Cached admin token expired");
        }

        let token = self.sign_in().await?;
        self.replace(AdminCredential::issued(token.clone(), self.ttl));
        tracing::info!("Admin token refreshed: {}", redact_token(&token));
        Some(token)
    }

    fn has_credential(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
