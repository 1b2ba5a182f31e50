//! End-to-end tests for the consent middleware and endpoints.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode, header},
    response::Response,
    routing::get,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

use cookie_consent::config::{self, ConsentConfig, CookieEncoding, Overrides};
use cookie_consent::consent::ConsentMap;
use cookie_consent::geo::{GeoLocation, StaticLookup};
use cookie_consent::http::{ConsentContext, ConsentState, attach};

const TEST_CONFIG: &str = r#"
[consent]
enabled = true

[compliance]
gdpr = true

[cookie_policy]
generator = true

[google]
enable_gtm = true
gtm_id = "GTM-TEST01"
enable_ga4 = true
ga4_id = "G-TEST0001"

[[categories]]
key = "essential"
required = true
cookies = ["csrfToken"]

[[categories]]
key = "preferences"
cookies = ["theme"]

[[categories]]
key = "statistics"
cookies = ["_ga", "_gid"]

[[categories]]
key = "marketing"
cookies = ["_fbp", "_dc_gtm_"]
"#;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn test_config() -> ConsentConfig {
    config::load_str(TEST_CONFIG).unwrap().consent
}

async fn echo(ctx: Option<Extension<ConsentContext>>, headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "context": ctx.map(|Extension(c)| c),
        "cookie": headers.get(header::COOKIE).and_then(|v| v.to_str().ok()),
    }))
}

fn app_with(state: ConsentState) -> Router {
    attach(Router::new().route("/", get(echo)), state)
}

fn app(config: ConsentConfig) -> Router {
    app_with(ConsentState::in_memory(config).unwrap())
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` part of the Set-Cookie for `name`.
fn cookie_pair(cookies: &[String], name: &str) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{name}=")))
        .map(|c| c.split(';').next().unwrap_or_default().to_string())
}

// ── Endpoints ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn accept_grants_everything_and_sets_cookies() {
    let response = app(test_config())
        .oneshot(post("/cookie-consent/accept", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert!(cookie_pair(&cookies, "consent_session").is_some());
    let session_cookie = cookies.iter().find(|c| c.starts_with("consent_session=")).unwrap();
    assert!(session_cookie.contains("HttpOnly"));

    let consent_cookie = cookies.iter().find(|c| c.starts_with("cookie_consent=")).unwrap();
    assert!(consent_cookie.contains("Max-Age=31536000"));
    assert!(consent_cookie.contains("SameSite=Lax"));
    let value = cookie_pair(&cookies, "cookie_consent").unwrap();
    let map = ConsentMap::decode_cookie(value.trim_start_matches("cookie_consent="), CookieEncoding::Raw);
    assert!(map.is_granted("marketing"));
    assert!(map.is_granted("essential"));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["categories"],
        json!({"essential": true, "preferences": true, "statistics": true, "marketing": true})
    );
}

#[tokio::test]
async fn reject_without_category_keeps_required() {
    let response = app(test_config())
        .oneshot(post("/cookie-consent/reject", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["categories"],
        json!({"essential": true, "preferences": false, "statistics": false, "marketing": false})
    );
    assert!(body.get("category").is_none());
}

#[tokio::test]
async fn reject_single_category_echoes_it() {
    let app = app(test_config());
    let accepted = app.clone().oneshot(post("/cookie-consent/accept", "")).await.unwrap();
    let session = cookie_pair(&set_cookies(&accepted), "consent_session").unwrap();

    let mut request = post("/cookie-consent/reject", r#"{"category":"marketing"}"#);
    request
        .headers_mut()
        .insert(header::COOKIE, session.parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Existing session: no new session cookie.
    assert!(cookie_pair(&set_cookies(&response), "consent_session").is_none());

    let body = json_body(response).await;
    assert_eq!(body["category"], "marketing");
    assert_eq!(body["categories"]["marketing"], false);
    assert_eq!(body["categories"]["statistics"], true);
}

#[tokio::test]
async fn returning_visitor_keeps_prior_grants_on_single_reject() {
    let app = app(test_config());
    let prior = format!(
        "cookie_consent={}",
        urlencoding::encode(r#"{"essential":true,"statistics":true,"marketing":true}"#)
    );

    // Consent cookie survived, server session did not.
    let mut request = post("/cookie-consent/reject", r#"{"category":"marketing"}"#);
    request.headers_mut().insert(header::COOKIE, prior.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    let consent = cookie_pair(&cookies, "cookie_consent").unwrap();

    let body = json_body(response).await;
    assert_eq!(
        body["categories"],
        json!({"essential": true, "statistics": true, "marketing": false})
    );

    let response = app
        .oneshot(get_with_cookie("/", &format!("{consent}; _ga=GA1.1")))
        .await
        .unwrap();
    assert!(set_cookies(&response).is_empty());
    let body = json_body(response).await;
    assert_eq!(body["context"]["consent_given"], true);
    let scripts = body["context"]["scripts"].as_array().unwrap();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].as_str().unwrap().contains("G-TEST0001"));
}

#[tokio::test]
async fn reject_refuses_unknown_and_required() {
    let app = app(test_config());
    let unknown = app
        .clone()
        .oneshot(post("/cookie-consent/reject", r#"{"category":"nope"}"#))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let required = app
        .clone()
        .oneshot(post("/cookie-consent/reject", r#"{"category":"essential"}"#))
        .await
        .unwrap();
    assert_eq!(required.status(), StatusCode::BAD_REQUEST);

    let empty = app
        .oneshot(post("/cookie-consent/reject", r#"{"category":""}"#))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    let body = json_body(empty).await;
    assert_eq!(body["message"], "Category must be a non-empty string");
}

#[tokio::test]
async fn customize_applies_choices() {
    let response = app(test_config())
        .oneshot(post(
            "/cookie-consent/customize",
            r#"{"categories":{"statistics":true,"marketing":false}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["categories"]["statistics"], true);
    assert_eq!(body["categories"]["marketing"], false);
    assert_eq!(body["categories"]["essential"], true);
    assert!(body["categories"].get("preferences").is_none());
}

#[tokio::test]
async fn customize_validates_body() {
    let app = app(test_config());

    let not_object = app
        .clone()
        .oneshot(post("/cookie-consent/customize", r#"{"categories":["marketing"]}"#))
        .await
        .unwrap();
    assert_eq!(not_object.status(), StatusCode::BAD_REQUEST);
    let body = json_body(not_object).await;
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["message"], "Categories must be an object");

    let not_bool = app
        .clone()
        .oneshot(post("/cookie-consent/customize", r#"{"categories":{"marketing":"yes"}}"#))
        .await
        .unwrap();
    assert_eq!(not_bool.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .clone()
        .oneshot(post("/cookie-consent/customize", r#"{"categories":{"ads":true}}"#))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let required_off = app
        .oneshot(post("/cookie-consent/customize", r#"{"categories":{"essential":false}}"#))
        .await
        .unwrap();
    assert_eq!(required_off.status(), StatusCode::BAD_REQUEST);
    let body = json_body(required_off).await;
    assert_eq!(body["message"], "Category essential is required and cannot be rejected");
}

#[tokio::test]
async fn accept_ignores_well_formed_body() {
    let app = app(test_config());
    let response = app
        .clone()
        .oneshot(post("/cookie-consent/accept", "[]"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post("/cookie-consent/reject", "[]"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let padding = "x".repeat(70 * 1024);
    let body = format!(r#"{{"categories":{{}},"padding":"{padding}"}}"#);
    let response = app(test_config())
        .oneshot(post("/cookie-consent/customize", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "payload_too_large");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let response = app(test_config())
        .oneshot(post("/cookie-consent/customize", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let response = app(test_config())
        .oneshot(Request::builder().uri("/cookie-consent/accept").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn decisions_are_audited() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.logging.enabled = true;
    config.logging.path = dir.path().join("logs/consent.log");
    let state = ConsentState::in_memory(config).unwrap();

    app_with(state.clone())
        .oneshot(post("/cookie-consent/accept", ""))
        .await
        .unwrap();

    let entries = state.service.consent_log().unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.value));
    assert_eq!(entries[0].category, "essential");
}

// ── Middleware ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn consent_cookie_unlocks_scripts() {
    let cookie = format!(
        "cookie_consent={}",
        urlencoding::encode(r#"{"essential":true,"statistics":true,"marketing":false}"#)
    );
    let response = app(test_config())
        .oneshot(get_with_cookie("/", &cookie))
        .await
        .unwrap();
    let body = json_body(response).await;
    let ctx = &body["context"];
    assert_eq!(ctx["region"], "EU");
    assert_eq!(ctx["in_target_region"], true);
    assert_eq!(ctx["consent_given"], true);
    let scripts = ctx["scripts"].as_array().unwrap();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].as_str().unwrap().contains("G-TEST0001"));
}

#[tokio::test]
async fn session_fallback_after_accept() {
    let app = app(test_config());
    let accepted = app.clone().oneshot(post("/cookie-consent/accept", "")).await.unwrap();
    let session = cookie_pair(&set_cookies(&accepted), "consent_session").unwrap();

    let response = app.oneshot(get_with_cookie("/", &session)).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["context"]["consent_given"], true);
    assert_eq!(body["context"]["consent"]["marketing"], true);
    assert_eq!(body["context"]["scripts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn non_essential_cookies_stripped_without_consent() {
    let response = app(test_config())
        .oneshot(get_with_cookie("/", "csrfToken=abc; _ga=GA1.1; _dc_gtm_UA1=1; theme=dark; other=x"))
        .await
        .unwrap();
    let expired = set_cookies(&response);
    assert_eq!(expired.len(), 3);
    assert!(expired.iter().all(|c| c.contains("Max-Age=0")));
    assert!(cookie_pair(&expired, "_ga").is_some());
    assert!(cookie_pair(&expired, "_dc_gtm_UA1").is_some());

    let body = json_body(response).await;
    assert_eq!(body["cookie"], "csrfToken=abc; other=x");
    assert_eq!(body["context"]["consent_given"], false);
    assert!(body["context"]["scripts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn disabled_layer_passes_through() {
    let mut config = test_config();
    config.enabled = false;
    let response = app(config)
        .oneshot(get_with_cookie("/", "_ga=GA1.1"))
        .await
        .unwrap();
    assert!(set_cookies(&response).is_empty());
    let body = json_body(response).await;
    assert!(body["context"].is_null());
    assert_eq!(body["cookie"], "_ga=GA1.1");
}

#[tokio::test]
async fn visitors_outside_target_regions_keep_cookies() {
    let mut config = test_config();
    config.geo.enabled = true;
    let visitor: IpAddr = "203.0.113.20".parse().unwrap();
    let lookup = StaticLookup::new().with(visitor, GeoLocation::new("US", Some("NY")));
    let state = ConsentState::in_memory(config).unwrap().with_lookup(Arc::new(lookup));

    let mut request = get_with_cookie("/", "_ga=GA1.1");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(visitor, 40000)));
    let response = app_with(state).oneshot(request).await.unwrap();
    assert!(set_cookies(&response).is_empty());

    let body = json_body(response).await;
    assert_eq!(body["context"]["region"], "US");
    assert_eq!(body["context"]["in_target_region"], false);
    assert_eq!(body["cookie"], "_ga=GA1.1");
}

#[tokio::test]
async fn accept_language_selects_locale() {
    let mut config = test_config();
    config.multilingual.enabled = true;
    config.multilingual.supported_langs = vec!["en_US".into(), "fr_FR".into()];
    let request = Request::builder()
        .uri("/")
        .header(header::ACCEPT_LANGUAGE, "fr-CH, fr;q=0.9, en;q=0.8")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app(config).oneshot(request).await.unwrap()).await;
    assert_eq!(body["context"]["locale"], "fr_FR");
}

// ── Status / policy ─────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_compliance() {
    let cookie = format!(
        "cookie_consent={}; _fbp=fb.1",
        urlencoding::encode(r#"{"essential":true,"marketing":false}"#)
    );
    let response = app(test_config())
        .oneshot(get_with_cookie("/cookie-consent/status", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["enabled"], true);
    assert_eq!(body["context"]["consent_given"], true);
    assert_eq!(body["compliance"]["gdpr"], false);
    assert_eq!(body["cookies"]["_fbp"]["category"], "Marketing");
}

#[tokio::test]
async fn policy_page_follows_generator_switch() {
    let response = app(test_config())
        .oneshot(Request::builder().uri("/cookie-consent/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Statistics"));
    assert!(html.contains("_gid"));

    let mut config = test_config();
    config.policy.generator = false;
    let response = app(config)
        .oneshot(Request::builder().uri("/cookie-consent/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── Shipped configuration ───────────────────────────────────────────────────

#[test]
fn shipped_default_config_loads() {
    let config = config::load_from(Path::new("config/default.toml"), &Overrides::default()).unwrap();
    let consent = config.consent;
    assert!(consent.enabled);
    assert_eq!(consent.categories.len(), 4);
    assert!(consent.category("essential").unwrap().required);
    assert!(consent.category_of_cookie("_ga_ABC123").is_some());
    assert_eq!(consent.banner.text_for("fr_FR").accept_text, "Tout accepter");
}
