// web-server/src/handoff.rs
// Transitional page that moves an upstream session token into the browser
use actix_web::{get, http::header::ContentType, web, HttpResponse, Responder};
use common::{redact_token, Config};
use crate::upstream::ME_PATH;

// Cookie max age in seconds (24 hours)
const COOKIE_MAX_AGE: u64 = 86400;
// Delay before leaving the handoff page
const REDIRECT_DELAY_MS: u64 = 3000;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(auth_handoff);
}

#[get("/auth/{token}")]
pub async fn auth_handoff(path: web::Path<String>, config: web::Data<Config>) -> impl Responder {
    let token = path.into_inner();
    tracing::info!("Auth handoff requested for token {}", redact_token(&token));

    let html = render_handoff_page(
        &token,
        config.upstream.url.as_deref(),
        &config.upstream.demo_redirect_url,
    );

    HttpResponse::Ok()
        .content_type(ContentType::html())
        .insert_header(("Cache-Control", "no-store"))
        .body(html)
}

/// Encode `value` as a JavaScript string literal that is safe inside <script>
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

/// Final destination: the upstream origin with the token in the query string
fn upstream_redirect(base: &str, token: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!("{}?access_token={}&token={}", base, encoded, encoded)
}

pub fn render_handoff_page(token: &str, upstream_url: Option<&str>, fallback_url: &str) -> String {
    let base = upstream_url.unwrap_or(fallback_url);
    let verify_url = upstream_url
        .map(|url| format!("{}{}", url, ME_PATH))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Authenticating...</title>
  <style>
    body {{ font-family: Arial, sans-serif; text-align: center; padding: 50px; background: #1a1a1a; color: white; }}
    .spinner {{ border: 4px solid #f3f3f3; border-top: 4px solid #ff6b9d; border-radius: 50%; width: 40px; height: 40px; animation: spin 1s linear infinite; margin: 20px auto; }}
    @keyframes spin {{ 0% {{ transform: rotate(0deg); }} 100% {{ transform: rotate(360deg); }} }}
  </style>
</head>
<body>
  <h2>Signing you in...</h2>
  <div class="spinner"></div>
  <p>Please wait while we log you in...</p>

  <script>
    const token = {token};
    const verifyUrl = {verify_url};
    const redirectUrl = {redirect_url};

    localStorage.setItem('access_token', token);
    localStorage.setItem('token', token);
    localStorage.setItem('openwebui_token', token);

    sessionStorage.setItem('access_token', token);
    sessionStorage.setItem('token', token);
    sessionStorage.setItem('openwebui_token', token);

    document.cookie = 'access_token=' + encodeURIComponent(token) + '; path=/; max-age={max_age}; SameSite=Lax';
    document.cookie = 'token=' + encodeURIComponent(token) + '; path=/; max-age={max_age}; SameSite=Lax';
    document.cookie = 'openwebui_token=' + encodeURIComponent(token) + '; path=/; max-age={max_age}; SameSite=Lax';

    if (window.fetch && verifyUrl && token) {{
      fetch(verifyUrl, {{
        method: 'GET',
        headers: {{ 'Authorization': 'Bearer ' + token, 'Content-Type': 'application/json' }}
      }}).then(response => {{
        console.log('Auth verification response:', response.status);
      }}).catch(err => {{
        console.log('Auth verification failed:', err);
      }});
    }}

    setTimeout(() => {{
      window.location.href = redirectUrl;
    }}, {delay});
  </script>
</body>
</html>
"#,
        token = js_string(token),
        verify_url = js_string(&verify_url),
        redirect_url = js_string(&upstream_redirect(base, token)),
        max_age = COOKIE_MAX_AGE,
        delay = REDIRECT_DELAY_MS,
    )
}
