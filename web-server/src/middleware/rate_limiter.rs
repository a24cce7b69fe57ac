// web-server/src/middleware/rate_limiter.rs
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, Duration};
use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{header, StatusCode},
    Error, ResponseError,
    HttpResponse
};
use common::{models::ForwardResult, RateLimitConfig};
use dashmap::DashMap;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::fmt;
use crate::utils::client::client_ip;

// Custom error for rate limiting
#[derive(Debug)]
struct RateLimitExceeded {
    message: &'static str,
    retry_after: u64,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate limit exceeded")
    }
}

impl ResponseError for RateLimitExceeded {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, self.retry_after.to_string()))
            .json(ForwardResult::failure(self.message))
    }
}

/// What to do with a request after counting it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Allow,
    Delay(Duration),
    Reject,
}

/// Per-IP fixed-window limiter with optional slow-down
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Path prefixes this limiter applies to; empty means every path
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    /// Requests allowed before each further one is delayed
    slow_down: Option<(usize, Duration)>,
    message: &'static str,
    /// Key on forwarded headers instead of the socket peer
    trust_proxy: bool,
    store: Arc<DashMap<String, Vec<Instant>>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, max_requests: usize, window: Duration) -> Self {
        Self {
            paths,
            max_requests,
            window,
            slow_down: None,
            message: "Too many requests from this IP, please try again later.",
            trust_proxy: false,
            store: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Limiter covering every path, with slow-down
    pub fn general(config: &RateLimitConfig) -> Self {
        Self::new(Vec::new(), config.max_requests, Duration::from_secs(config.window_secs))
            .with_slow_down(config.delay_after, Duration::from_millis(config.delay_ms))
    }

    /// Stricter limiter for the credential endpoints
    pub fn auth(config: &RateLimitConfig) -> Self {
        let mut limiter = Self::new(
            vec!["/api/register".to_string(), "/api/login".to_string()],
            config.auth_max_requests,
            Duration::from_secs(config.window_secs),
        );
        limiter.message = "Too many login attempts, please try again later.";
        limiter
    }

    pub fn with_slow_down(mut self, delay_after: usize, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.slow_down = Some((delay_after, delay));
        }
        self
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.is_empty() || self.paths.iter().any(|p| path.starts_with(p))
    }

    fn check(&self, ip: &str) -> Decision {
        let now = Instant::now();
        self.sweep_expired(now);

        let mut hits = self.store.entry(ip.to_string()).or_insert_with(Vec::new);

        hits.retain(|time| now.duration_since(*time) < self.window);

        if hits.len() >= self.max_requests {
            return Decision::Reject;
        }
        hits.push(now);

        match self.slow_down {
            Some((delay_after, delay)) if hits.len() > delay_after => Decision::Delay(delay),
            _ => Decision::Allow,
        }
    }

    /// Drop clients with no hit inside the window, at most once per window
    fn sweep_expired(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if now.saturating_duration_since(*last_sweep) < self.window {
                return;
            }
            *last_sweep = now;
        }

        let window = self.window;
        self.store.retain(|_, hits| {
            hits.last()
                .map_or(false, |time| now.saturating_duration_since(*time) < window)
        });
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !self.limiter.applies_to(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let ip = client_ip(req.peer_addr(), &req.connection_info(), self.limiter.trust_proxy);

        let delay = match self.limiter.check(&ip) {
            Decision::Reject => {
                tracing::warn!("Rate limit exceeded for IP: {} on {}", ip, req.path());
                let error = RateLimitExceeded {
                    message: self.limiter.message,
                    retry_after: self.limiter.window.as_secs(),
                };
                // Answered as a response so outer middleware still applies its headers
                let response = req.into_response(error.error_response()).map_into_right_body();
                return Box::pin(async move { Ok(response) });
            }
            Decision::Delay(delay) => Some(delay),
            Decision::Allow => None,
        };

        let fut = self.service.call(req);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            fut.await.map(ServiceResponse::map_into_left_body)
        })
    }
}
