//! Handlers for the `/cookie-consent/*` endpoints.
//!
//! Every successful POST stores the new decisions in the visitor's session,
//! issues a session cookie if the visitor had none, and rewrites the consent
//! cookie so the next request sees the same map without a session lookup.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use axum::{
    Extension, Json,
    body::{Bytes, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::consent::{ConsentMap, CookieAttributes, RequestCookies, SessionId, set_cookie};
use crate::geo::client_ip;

use super::{ConsentContext, ConsentState, view};

/// Largest request body the consent endpoints read.
const BODY_LIMIT: usize = 64 * 1024;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    Internal(String),
}

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json_error("bad_request", msg)).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json_error("not_found", msg)).into_response(),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json_error("payload_too_large", msg)).into_response()
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", msg)).into_response()
            }
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Who is submitting a decision.
struct Visitor {
    session: SessionId,
    new_session: bool,
    cookies: RequestCookies,
    ip: Option<IpAddr>,
}

impl Visitor {
    fn from_parts(state: &ConsentState, parts: &Parts) -> Self {
        let cookies = RequestCookies::from_headers(&parts.headers);
        let existing = cookies
            .get(&state.config.session.cookie_name)
            .and_then(SessionId::parse);
        let new_session = existing.is_none();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Self {
            session: existing.unwrap_or_else(SessionId::generate),
            new_session,
            ip: client_ip(&parts.headers, peer, state.config.geo.trust_forwarded_for),
            cookies,
        }
    }
}

/// Split the request and read its JSON body. An empty body is `None`.
async fn read_request(state: &ConsentState, request: Request) -> Result<(Visitor, Option<Value>), ApiError> {
    let (parts, body) = request.into_parts();
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > BODY_LIMIT) {
        return Err(too_large());
    }
    let visitor = Visitor::from_parts(state, &parts);
    // Collection only fails on the length limit once the body has arrived.
    let bytes = to_bytes(body, BODY_LIMIT).await.map_err(|e| {
        warn!("request body rejected: {e}");
        too_large()
    })?;
    Ok((visitor, parse_body(&bytes)?))
}

fn too_large() -> ApiError {
    ApiError::PayloadTooLarge(format!("Request body exceeds {BODY_LIMIT} bytes"))
}

/// Parse any well-formed JSON body; empty is `None`.
fn parse_body(bytes: &Bytes) -> Result<Option<Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {e}")))
}

/// Bodies of decision endpoints must be JSON objects when present.
fn object_body(body: Option<Value>) -> Result<Option<serde_json::Map<String, Value>>, ApiError> {
    match body {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ApiError::BadRequest("Request body must be a JSON object".into())),
    }
}

/// Apply `decisions` in order as one session update, then answer with the
/// resulting map and the session/consent cookies. A visitor without a
/// recorded session keeps the choices carried by their consent cookie.
fn record(
    state: &ConsentState,
    visitor: &Visitor,
    decisions: &[(String, bool)],
    mut body: serde_json::Map<String, Value>,
) -> Result<Response, ApiError> {
    let seed = state.service.cookie_consent(&visitor.cookies);
    let consent = state
        .service
        .record_decisions(&visitor.session, seed, decisions, visitor.ip)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(session = %visitor.session, decisions = decisions.len(), "consent updated");

    let config = &state.config;
    let attrs = CookieAttributes::from(&config.cookie);
    let mut cookies = Vec::with_capacity(2);
    if visitor.new_session {
        let session_attrs = attrs.clone().with_http_only(true);
        cookies.push(set_cookie(
            &config.session.cookie_name,
            visitor.session.as_str(),
            &session_attrs,
            None,
        ));
    }
    cookies.push(set_cookie(
        &config.cookie.name,
        &consent.encode_cookie(config.cookie.encoding),
        &attrs,
        Some(config.cookie.expiration),
    ));

    body.insert("success".into(), Value::Bool(true));
    body.insert("categories".into(), consent.to_json());
    Ok((
        StatusCode::OK,
        AppendHeaders(cookies.into_iter().map(|c| (header::SET_COOKIE, c))),
        Json(Value::Object(body)),
    )
        .into_response())
}

fn check_known(state: &ConsentState, category: &str) -> Result<bool, ApiError> {
    state
        .config
        .category(category)
        .map(|c| c.required)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown category: {category}")))
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /cookie-consent/accept: grant every configured category.
pub async fn accept(State(state): State<ConsentState>, request: Request) -> Response {
    accept_inner(&state, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn accept_inner(state: &ConsentState, request: Request) -> Result<Response, ApiError> {
    // Malformed JSON is still refused; well-formed content is ignored.
    let (visitor, _) = read_request(state, request).await?;
    let decisions: Vec<(String, bool)> = state
        .config
        .categories
        .iter()
        .map(|c| (c.key.clone(), true))
        .collect();
    record(state, &visitor, &decisions, serde_json::Map::new())
}

/// POST /cookie-consent/reject: `{"category": "x"}` declines one category;
/// without a category every optional one is declined and required ones are
/// granted.
pub async fn reject(State(state): State<ConsentState>, request: Request) -> Response {
    reject_inner(&state, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn reject_inner(state: &ConsentState, request: Request) -> Result<Response, ApiError> {
    let (visitor, body) = read_request(state, request).await?;
    let body = object_body(body)?;
    let category = match body.as_ref().and_then(|b| b.get("category")) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(_) => return Err(ApiError::BadRequest("Category must be a non-empty string".into())),
    };

    let mut extra = serde_json::Map::new();
    let decisions = match category {
        Some(category) => {
            if check_known(state, &category)? {
                return Err(ApiError::BadRequest(format!(
                    "Category {category} is required and cannot be rejected"
                )));
            }
            extra.insert("category".into(), Value::String(category.clone()));
            vec![(category, false)]
        }
        None => state
            .config
            .categories
            .iter()
            .map(|c| (c.key.clone(), c.required))
            .collect(),
    };
    record(state, &visitor, &decisions, extra)
}

/// POST /cookie-consent/customize: `{"categories": {"x": bool, …}}`.
pub async fn customize(State(state): State<ConsentState>, request: Request) -> Response {
    customize_inner(&state, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn customize_inner(state: &ConsentState, request: Request) -> Result<Response, ApiError> {
    let (visitor, body) = read_request(state, request).await?;
    let body = object_body(body)?;
    let categories = match body.as_ref().and_then(|b| b.get("categories")) {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ApiError::BadRequest("Categories must be an object".into())),
    };

    let mut decisions = Vec::with_capacity(categories.len());
    for (category, value) in categories {
        let Value::Bool(granted) = value else {
            return Err(ApiError::BadRequest(format!(
                "Consent for {category} must be a boolean"
            )));
        };
        if check_known(state, &category)? && !granted {
            return Err(ApiError::BadRequest(format!(
                "Category {category} is required and cannot be rejected"
            )));
        }
        decisions.push((category, granted));
    }
    // Required categories come along with any explicit choice.
    for required in state.config.required_categories() {
        if !decisions.iter().any(|(k, _)| *k == required.key) {
            decisions.push((required.key.clone(), true));
        }
    }
    record(state, &visitor, &decisions, serde_json::Map::new())
}

/// GET /cookie-consent/status: the request's consent context and a
/// compliance report for each enabled regulation.
pub async fn status(
    State(state): State<ConsentState>,
    ctx: Option<Extension<ConsentContext>>,
    headers: HeaderMap,
) -> Response {
    let cookies = RequestCookies::from_headers(&headers);
    let consent = match &ctx {
        Some(Extension(ctx)) => ctx.consent.clone(),
        None => state.service.cookie_consent(&cookies).unwrap_or_else(ConsentMap::new),
    };
    let compliance: BTreeMap<String, bool> = state.service.compliance_report(&consent, &cookies);
    Json(json!({
        "enabled": state.config.enabled,
        "context": ctx.map(|Extension(ctx)| ctx),
        "consent": consent,
        "cookies": state.service.scan_cookies(&cookies),
        "compliance": compliance,
    }))
    .into_response()
}

/// GET /cookie-consent/policy: generated cookie policy page.
pub async fn policy(State(state): State<ConsentState>, ctx: Option<Extension<ConsentContext>>) -> Response {
    if !state.config.policy.generator {
        return ApiError::NotFound("cookie policy generator is disabled".into()).into_response();
    }
    let locale = ctx
        .as_ref()
        .map_or(state.config.multilingual.fallback_locale.as_str(), |Extension(c)| c.locale.as_str());
    match view::render_policy(&state.config, locale) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!("cookie policy render failed: {e}");
            ApiError::Internal("cookie policy unavailable".into()).into_response()
        }
    }
}
