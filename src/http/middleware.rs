//! Per-request consent tracking.
//!
//! Resolves the visitor's region and consent, strips non-essential cookies
//! while consent is outstanding, selects the permitted scripts and exposes
//! the result to handlers as a [`ConsentContext`] request extension.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ConsentConfig;
use crate::consent::{
    ConsentMap, CookieAttributes, CookieBlocker, RequestCookies, SessionId, blockable_cookies, expire_cookie,
};
use crate::geo::{Region, client_ip, detect_region, in_target_region};
use crate::i18n::request_locale;
use crate::integrations::scripts_for;

use super::ConsentState;

/// What the middleware learned about the current request.
#[derive(Debug, Clone, Serialize)]
pub struct ConsentContext {
    pub region: Region,
    /// Consent rules apply to this visitor.
    pub in_target_region: bool,
    pub consent_given: bool,
    pub consent: ConsentMap,
    /// Rendered script snippets the visitor consented to.
    pub scripts: Vec<String>,
    pub locale: String,
}

impl ConsentContext {
    /// Whether `consent` settles the banner: something was decided and every
    /// required category is granted.
    pub fn is_settled(config: &ConsentConfig, consent: &ConsentMap) -> bool {
        !consent.is_empty()
            && config
                .required_categories()
                .all(|c| consent.is_granted(&c.key))
    }
}

pub async fn track_consent(
    State(state): State<ConsentState>,
    mut req: Request,
    next: Next,
) -> Response {
    let config = state.config.clone();
    if !config.enabled {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(req.headers(), peer, config.geo.trust_forwarded_for);
    let region = detect_region(ip, state.geo.as_deref()).await;
    let in_target = in_target_region(&config.geo, region);

    let cookies = RequestCookies::from_headers(req.headers());
    let consent = match state.service.cookie_consent(&cookies) {
        Some(map) => map,
        None => cookies
            .get(&config.session.cookie_name)
            .and_then(SessionId::parse)
            .and_then(|id| state.service.session_consent(&id))
            .unwrap_or_default(),
    };
    let consent_given = ConsentContext::is_settled(&config, &consent);

    let mut expired = Vec::new();
    if in_target && !consent_given {
        let blocked = blockable_cookies(&config, &CookieBlocker::new(&consent), &cookies);
        if !blocked.is_empty() {
            let headers = req.headers_mut();
            headers.remove(header::COOKIE);
            if let Some(kept) = cookies.header_without(&blocked) {
                if let Ok(value) = HeaderValue::from_str(&kept) {
                    headers.insert(header::COOKIE, value);
                }
            }
            let attrs = CookieAttributes::from(&config.cookie).with_http_only(false);
            let mut names: Vec<&String> = blocked.iter().collect();
            names.sort();
            expired = names.iter().map(|name| expire_cookie(name, &attrs)).collect();
            debug!(%region, blocked = names.len(), "stripped non-essential cookies");
        }
    }

    let scripts = scripts_for(&config, &consent);
    let accept_language = req
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    let locale = request_locale(&config.multilingual, accept_language);

    trace!(%region, in_target, consent_given, scripts = scripts.len(), %locale, "consent context");
    req.extensions_mut().insert(ConsentContext {
        region,
        in_target_region: in_target,
        consent_given,
        consent,
        scripts,
        locale,
    });

    let mut response = next.run(req).await;
    for cookie in expired {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn settled_needs_required_categories() {
        let config = Config::test_default().consent;
        let mut consent = ConsentMap::new();
        assert!(!ConsentContext::is_settled(&config, &consent));
        consent.set("marketing", true);
        assert!(!ConsentContext::is_settled(&config, &consent));
        consent.set("essential", true);
        assert!(ConsentContext::is_settled(&config, &consent));
    }

    #[test]
    fn settled_without_required_categories() {
        let mut config = Config::test_default().consent;
        config.categories.retain(|c| !c.required);
        let mut consent = ConsentMap::new();
        assert!(!ConsentContext::is_settled(&config, &consent));
        consent.set("marketing", false);
        assert!(ConsentContext::is_settled(&config, &consent));
    }
}
