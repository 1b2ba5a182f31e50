//! axum integration: the consent-tracking middleware, the
//! `/cookie-consent/*` endpoints and the view helpers.
//!
//! ## URL layout
//!
//! ```text
//! POST /cookie-consent/accept
//! POST /cookie-consent/reject
//! POST /cookie-consent/customize
//! GET  /cookie-consent/status
//! GET  /cookie-consent/policy   (when cookie_policy.generator is on)
//! ```

pub mod api;
mod middleware;
pub mod view;

pub use middleware::{ConsentContext, track_consent};

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ConsentConfig;
use crate::consent::{ConsentService, MemorySessionStore, SessionStore};
use crate::error::AppError;
use crate::geo::CountryLookup;

/// Path prefix of the consent endpoints.
pub const ROUTE_PREFIX: &str = "/cookie-consent";

// ── Shared request state ────────────────────────────────────────────────────

/// State shared by the middleware and the handlers.
///
/// Cheap to clone; all fields are reference-counted.
#[derive(Clone)]
pub struct ConsentState {
    pub config: Arc<ConsentConfig>,
    pub service: Arc<ConsentService>,
    /// `None` when geo-targeting is off; no lookups are made then.
    pub geo: Option<Arc<dyn CountryLookup>>,
}

impl ConsentState {
    pub fn new(config: ConsentConfig, sessions: Arc<dyn SessionStore>) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let geo = default_lookup(&config)?;
        Ok(Self {
            service: Arc::new(ConsentService::new(config.clone(), sessions)),
            config,
            geo,
        })
    }

    /// State backed by an in-process [`MemorySessionStore`].
    pub fn in_memory(config: ConsentConfig) -> Result<Self, AppError> {
        Self::new(config, Arc::new(MemorySessionStore::default()))
    }

    /// Replace the country lookup. Ignored while geo-targeting is off.
    pub fn with_lookup(mut self, lookup: Arc<dyn CountryLookup>) -> Self {
        if self.config.geo.enabled {
            self.geo = Some(lookup);
        }
        self
    }
}

#[cfg(feature = "geo-ipapi")]
fn default_lookup(config: &ConsentConfig) -> Result<Option<Arc<dyn CountryLookup>>, AppError> {
    if !config.geo.enabled {
        return Ok(None);
    }
    let lookup = crate::geo::IpApiLookup::from_config(&config.geo)?;
    Ok(Some(Arc::new(lookup)))
}

#[cfg(not(feature = "geo-ipapi"))]
fn default_lookup(config: &ConsentConfig) -> Result<Option<Arc<dyn CountryLookup>>, AppError> {
    if config.geo.enabled {
        warn!("geo-targeting enabled but built without a lookup backend; supply one with ConsentState::with_lookup");
    }
    Ok(None)
}

// ── Router ──────────────────────────────────────────────────────────────────

/// The `/cookie-consent/*` endpoints.
pub fn routes(state: ConsentState) -> Router {
    Router::new()
        .route(&format!("{ROUTE_PREFIX}/accept"), post(api::accept))
        .route(&format!("{ROUTE_PREFIX}/reject"), post(api::reject))
        .route(&format!("{ROUTE_PREFIX}/customize"), post(api::customize))
        .route(&format!("{ROUTE_PREFIX}/status"), get(api::status))
        .route(&format!("{ROUTE_PREFIX}/policy"), get(api::policy))
        .with_state(state)
}

/// Mount the consent endpoints on `app` and wrap everything in the
/// consent-tracking middleware and a request trace span.
pub fn attach(app: Router, state: ConsentState) -> Router {
    if !state.config.enabled {
        warn!("cookie consent is disabled; requests pass through untouched");
    }
    app.merge(routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(state, track_consent))
        .layer(TraceLayer::new_for_http())
}
