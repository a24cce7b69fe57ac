// web-server/src/forwarder.rs
// Forwards register/login calls to the upstream and translates its answers
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use common::{
    models::{AuthRequest, ForwardResult},
    redact_token, Config, UpstreamConfig,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use crate::token_cache::CredentialStore;
use crate::upstream::{UpstreamClient, UpstreamError, UpstreamReply};
use crate::utils::{client::client_ip, sanitize::sanitize_input};

const MISSING_FIELDS: &str = "Email and password are required";
const SERVER_ERROR: &str = "Server error. Please try again later.";
const SERVICE_UNAVAILABLE: &str = "The sign-in service is currently unavailable. Please try again later.";
const REGISTRATION_PENDING: &str = "Registration successful! Your account is pending approval.";
const REGISTRATION_FAILED: &str = "Registration failed. Please try again.";
const LOGIN_SUCCESS: &str = "Login successful!";
const LOGIN_FAILED: &str = "Login failed. Check your credentials.";

/// Who is calling and under which origin the gateway was reached
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client address, used for audit logging
    pub peer: String,
    /// `{scheme}://{host}` of this gateway as seen by the client
    pub origin: String,
}

impl RequestContext {
    pub fn from_request(req: &HttpRequest) -> Self {
        let trust_proxy = req
            .app_data::<web::Data<Config>>()
            .map_or(false, |config| config.server.trust_proxy);
        let info = req.connection_info();
        Self {
            peer: client_ip(req.peer_addr(), &info, trust_proxy),
            origin: format!("{}://{}", info.scheme(), info.host()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("{0}")]
    Validation(String),

    #[error("upstream rejected the request with status {status}")]
    UpstreamRejection {
        status: u16,
        message: String,
        payload: Value,
    },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ForwardError {
    fn rejection(reply: UpstreamReply, fallback: &str) -> Self {
        ForwardError::UpstreamRejection {
            status: reply.status.as_u16(),
            message: reply.detail().unwrap_or(fallback).to_string(),
            payload: reply.body,
        }
    }
}

impl ResponseError for ForwardError {
    fn status_code(&self) -> StatusCode {
        match self {
            ForwardError::Validation(_) => StatusCode::BAD_REQUEST,
            ForwardError::UpstreamRejection { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ForwardError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ForwardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal causes stay in the logs
        let body = match self {
            ForwardError::Validation(message) => ForwardResult::failure(message.clone()),
            ForwardError::UpstreamRejection { message, payload, .. } => {
                ForwardResult::failure(message.clone()).with_error(payload.clone())
            }
            ForwardError::UpstreamUnavailable(_) => ForwardResult::failure(SERVICE_UNAVAILABLE),
            ForwardError::Internal(_) => ForwardResult::failure(SERVER_ERROR),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Sanitized credentials, both guaranteed non-empty
struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    fn sanitize(request: &AuthRequest) -> Result<Self, ForwardError> {
        let email = sanitize_input(&request.email);
        let password = sanitize_input(&request.password);

        if email.is_empty() || password.is_empty() {
            return Err(ForwardError::Validation(MISSING_FIELDS.to_string()));
        }

        Ok(Self { email, password })
    }

    /// Display name derived from the email's local part
    fn name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

pub struct AuthForwarder {
    upstream: Arc<UpstreamClient>,
    credentials: Arc<dyn CredentialStore>,
    api_key_configured: bool,
    demo_redirect_url: String,
    demo_fallback: bool,
}

impl AuthForwarder {
    pub fn new(
        upstream: Arc<UpstreamClient>,
        credentials: Arc<dyn CredentialStore>,
        config: &UpstreamConfig,
    ) -> Self {
        Self {
            upstream,
            credentials,
            api_key_configured: config.api_key.is_some(),
            demo_redirect_url: config.demo_redirect_url.clone(),
            demo_fallback: config.demo_fallback,
        }
    }

    /// Register a new account with the upstream. Accounts start out pending.
    pub async fn register(
        &self,
        request: AuthRequest,
        ctx: &RequestContext,
    ) -> Result<ForwardResult, ForwardError> {
        let credentials = Credentials::sanitize(&request)?;
        tracing::info!("Registration attempt from IP: {}, Email: {}", ctx.peer, credentials.email);

        if self.upstream.base_url().is_none() {
            tracing::info!("Upstream not configured, simulating registration success (demo mode)");
            return Ok(ForwardResult::pending(REGISTRATION_PENDING));
        }

        if !self.api_key_configured && !self.credentials.has_credential() {
            tracing::info!("No API key or admin token found, simulating success (demo mode)");
            return Ok(ForwardResult::pending(REGISTRATION_PENDING));
        }

        let reply = self
            .upstream
            .signup(credentials.name(), &credentials.email, &credentials.password)
            .await
            .map_err(|e| Self::internal("Registration", e, ctx, &credentials.email))?;

        if reply.is_success() {
            tracing::info!("User registered via upstream signup: {}", credentials.email);
            Ok(ForwardResult::pending(REGISTRATION_PENDING))
        } else {
            tracing::error!("Upstream signup error: {} {}", reply.status, reply.body);
            Err(ForwardError::rejection(reply, REGISTRATION_FAILED))
        }
    }

    /// Sign the user in with the upstream and hand back a redirect to the
    /// gateway's token handoff page
    pub async fn login(
        &self,
        request: AuthRequest,
        ctx: &RequestContext,
    ) -> Result<ForwardResult, ForwardError> {
        let credentials = Credentials::sanitize(&request)?;
        tracing::info!("Login attempt from IP: {}, Email: {}", ctx.peer, credentials.email);

        let upstream_url = match self.upstream.base_url() {
            Some(url) => url.to_string(),
            None => {
                tracing::info!("Upstream not configured, simulating login success (demo mode)");
                return Ok(ForwardResult::demo(
                    "Login successful! (Demo mode)",
                    self.demo_redirect_url.clone(),
                ));
            }
        };

        if let Err(e) = self.upstream.probe().await {
            let reason = match e {
                UpstreamError::Status(_) => "not responding",
                _ => "not reachable",
            };
            tracing::warn!("Upstream {}: {}", reason, e);

            if !self.demo_fallback {
                return Err(ForwardError::UpstreamUnavailable(e.to_string()));
            }
            return Ok(ForwardResult::demo(
                format!("Login successful! (Demo mode - upstream {})", reason),
                upstream_url,
            ));
        }

        let reply = self
            .upstream
            .signin(&credentials.email, &credentials.password)
            .await
            .map_err(|e| Self::internal("Login", e, ctx, &credentials.email))?;

        if !reply.is_success() {
            tracing::error!("Upstream login error: {} {}", reply.status, reply.body);
            return Err(ForwardError::rejection(reply, LOGIN_FAILED));
        }

        let token = reply.session_token().ok_or_else(|| {
            Self::internal("Login", "sign-in response carried no token", ctx, &credentials.email)
        })?;
        let redirect_url = handoff_url(&ctx.origin, &token)?;
        tracing::info!("User logged in: {}, token {}", credentials.email, redact_token(&token));

        Ok(ForwardResult {
            redirect_url: Some(redirect_url),
            token: Some(token),
            ..ForwardResult::success(LOGIN_SUCCESS)
        })
    }

    fn internal(
        operation: &str,
        cause: impl std::fmt::Display,
        ctx: &RequestContext,
        email: &str,
    ) -> ForwardError {
        tracing::error!(ip = %ctx.peer, email = %email, "{} error: {}", operation, cause);
        ForwardError::Internal(cause.to_string())
    }
}

/// Same-origin URL of the handoff page for `token`
fn handoff_url(origin: &str, token: &str) -> Result<String, ForwardError> {
    let mut url = Url::parse(origin)
        .map_err(|e| ForwardError::Internal(format!("invalid origin {}: {}", origin, e)))?;

    url.path_segments_mut()
        .map_err(|_| ForwardError::Internal(format!("origin {} cannot carry a path", origin)))?
        .clear()
        .push("auth")
        .push(token);

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{SIGNIN_PATH, SIGNUP_PATH};
    use async_trait::async_trait;
    use common::Config;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Credential store double with a fixed answer
    struct MockStore(Option<String>);

    #[async_trait]
    impl CredentialStore for MockStore {
        async fn valid_token(&self) -> Option<String> {
            self.0.clone()
        }

        fn has_credential(&self) -> bool {
            self.0.is_some()
        }
    }

    fn forwarder(base_url: Option<String>, admin_token: Option<&str>) -> AuthForwarder {
        forwarder_with(base_url, admin_token, |_| {})
    }

    fn forwarder_with(
        base_url: Option<String>,
        admin_token: Option<&str>,
        tweak: impl FnOnce(&mut UpstreamConfig),
    ) -> AuthForwarder {
        let mut config = Config::default().upstream;
        config.url = base_url.clone();
        tweak(&mut config);
        let upstream = Arc::new(
            UpstreamClient::new(base_url, Duration::from_millis(200), Duration::from_secs(5))
                .unwrap(),
        );
        let store = Arc::new(MockStore(admin_token.map(str::to_string)));
        AuthForwarder::new(upstream, store, &config)
    }

    fn ctx() -> RequestContext {
        RequestContext {
            peer: "10.0.0.1".to_string(),
            origin: "http://gateway.local:8000".to_string(),
        }
    }

    fn request(email: &str, password: &str) -> AuthRequest {
        AuthRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn mount_probe(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_empty_fields_are_rejected_without_upstream_calls() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let forwarder = forwarder(Some(server.uri()), Some("admin"));

        for (email, password) in [("", "pw"), ("a@b.c", "   "), ("<script>x</script>", "pw")] {
            let err = forwarder.register(request(email, password), &ctx()).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

            let err = forwarder.login(request(email, password), &ctx()).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_register_without_credentials_is_demo_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let result = forwarder(Some(server.uri()), None)
            .register(request("jane@example.com", "secret"), &ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.status.as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn test_register_without_upstream_is_demo_mode_even_with_credentials() {
        let forwarder = forwarder_with(None, Some("admin"), |config| {
            config.api_key = Some("key".to_string());
        });

        let result = forwarder
            .register(request("jane@example.com", "secret"), &ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.status.as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn test_register_forwards_signup_with_derived_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .and(body_json(json!({
                "name": "jane",
                "email": "jane@example.com",
                "password": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u1" })))
            .expect(1)
            .mount(&server)
            .await;

        let result = forwarder(Some(server.uri()), Some("admin"))
            .register(request(" jane@example.com ", "secret"), &ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.status.as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn test_api_key_alone_enables_forwarding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = forwarder_with(Some(server.uri()), None, |config| {
            config.api_key = Some("key".to_string());
        });
        let result = forwarder.register(request("a@b.c", "pw"), &ctx()).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_register_conflict_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "detail": "exists" })))
            .mount(&server)
            .await;

        let err = forwarder(Some(server.uri()), Some("admin"))
            .register(request("jane@example.com", "secret"), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        match err {
            ForwardError::UpstreamRejection { message, payload, .. } => {
                assert_eq!(message, "exists");
                assert_eq!(payload, json!({ "detail": "exists" }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_rejection_without_detail_uses_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "errors": [] })))
            .mount(&server)
            .await;

        let err = forwarder(Some(server.uri()), Some("admin"))
            .register(request("jane@example.com", "secret"), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForwardError::UpstreamRejection { status: 422, ref message, .. } if message == REGISTRATION_FAILED
        ));
    }

    #[tokio::test]
    async fn test_register_unparsable_reply_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNUP_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = forwarder(Some(server.uri()), Some("admin"))
            .register(request("jane@example.com", "secret"), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_login_without_upstream_is_demo_mode() {
        let result = forwarder(None, None)
            .login(request("a@b.c", "pw"), &ctx())
            .await
            .unwrap();
        assert_eq!(result.demo_mode, Some(true));
        assert_eq!(result.redirect_url.as_deref(), Some("http://localhost:3000"));
    }

    #[tokio::test]
    async fn test_login_probe_timeout_is_demo_mode() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(200).set_delay(Duration::from_secs(2))).await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc" })))
            .expect(0)
            .mount(&server)
            .await;

        let result = forwarder(Some(server.uri()), None)
            .login(request("a@b.c", "pw"), &ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.demo_mode, Some(true));
        assert_eq!(result.redirect_url, Some(server.uri()));
        assert!(result.message.contains("not reachable"));
    }

    #[tokio::test]
    async fn test_login_probe_error_status_is_demo_mode() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(503)).await;

        let result = forwarder(Some(server.uri()), None)
            .login(request("a@b.c", "pw"), &ctx())
            .await
            .unwrap();
        assert_eq!(result.demo_mode, Some(true));
        assert!(result.message.contains("not responding"));
    }

    #[tokio::test]
    async fn test_login_probe_failure_without_fallback_is_unavailable() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(503)).await;

        let forwarder = forwarder_with(Some(server.uri()), None, |config| {
            config.demo_fallback = false;
        });
        let err = forwarder.login(request("a@b.c", "pw"), &ctx()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_login_success_redirects_to_handoff_page() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(200)).await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .and(body_json(json!({ "email": "a@b.c", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc" })))
            .expect(1)
            .mount(&server)
            .await;

        let result = forwarder(Some(server.uri()), None)
            .login(request("a@b.c", "pw"), &ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.token.as_deref(), Some("abc"));
        assert_eq!(result.demo_mode, None);

        let redirect = Url::parse(result.redirect_url.as_deref().unwrap()).unwrap();
        assert_eq!(redirect.path(), "/auth/abc");
        assert_eq!(redirect.host_str(), Some("gateway.local"));
    }

    #[tokio::test]
    async fn test_login_accepts_access_token_field() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(200)).await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "xyz" })),
            )
            .mount(&server)
            .await;

        let result = forwarder(Some(server.uri()), None)
            .login(request("a@b.c", "pw"), &ctx())
            .await
            .unwrap();
        assert_eq!(result.token.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_login_rejection_is_passed_through() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(200)).await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "detail": "The email or password provided is incorrect." })),
            )
            .mount(&server)
            .await;

        let err = forwarder(Some(server.uri()), None)
            .login(request("a@b.c", "wrong"), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            err,
            ForwardError::UpstreamRejection { ref message, .. }
                if message == "The email or password provided is incorrect."
        ));
    }

    #[tokio::test]
    async fn test_login_success_without_token_is_internal_error() {
        let server = MockServer::start().await;
        mount_probe(&server, ResponseTemplate::new(200)).await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u1" })))
            .mount(&server)
            .await;

        let err = forwarder(Some(server.uri()), None)
            .login(request("a@b.c", "pw"), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_handoff_url_encodes_token_segment() {
        assert_eq!(
            handoff_url("http://localhost:8000", "abc").unwrap(),
            "http://localhost:8000/auth/abc"
        );
        assert_eq!(
            handoff_url("https://gw.example.com", "a/b c").unwrap(),
            "https://gw.example.com/auth/a%2Fb%20c"
        );
    }

    #[test]
    fn test_request_context_ignores_forwarded_header_by_default() {
        let req = actix_web::test::TestRequest::default()
            .peer_addr("203.0.113.7:4000".parse().unwrap())
            .insert_header(("x-forwarded-for", "10.9.9.1"))
            .app_data(web::Data::new(Config::default()))
            .to_http_request();
        assert_eq!(RequestContext::from_request(&req).peer, "203.0.113.7");

        let mut config = Config::default();
        config.server.trust_proxy = true;
        let req = actix_web::test::TestRequest::default()
            .peer_addr("203.0.113.7:4000".parse().unwrap())
            .insert_header(("x-forwarded-for", "10.9.9.1"))
            .app_data(web::Data::new(config))
            .to_http_request();
        assert_eq!(RequestContext::from_request(&req).peer, "10.9.9.1");
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let response = ForwardError::Internal("db password is hunter2".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
