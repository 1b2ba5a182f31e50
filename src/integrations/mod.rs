//! Third-party tag snippets injected only with the matching consent.

pub mod consent_mode;
pub mod ga4;
pub mod gtm;

pub use consent_mode::ConsentModeIntegration;
pub use ga4::Ga4Integration;
pub use gtm::GtmIntegration;

use tracing::warn;

use crate::config::ConsentConfig;
use crate::consent::ConsentMap;

/// A script snippet gated on the visitor's consent.
pub trait ScriptIntegration {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Markup to inject, or `None` when disabled or not consented.
    fn render(&self, consent: &ConsentMap) -> Option<String>;
}

/// Every enabled integration for `config`, in injection order: Consent Mode
/// defaults first, then GTM, then GA4.
pub fn integrations(config: &ConsentConfig) -> Vec<Box<dyn ScriptIntegration>> {
    vec![
        Box::new(ConsentModeIntegration::new(config)),
        Box::new(GtmIntegration::new(&config.google)),
        Box::new(Ga4Integration::new(&config.google)),
    ]
}

/// Rendered snippets permitted by `consent`.
pub fn scripts_for(config: &ConsentConfig, consent: &ConsentMap) -> Vec<String> {
    integrations(config)
        .iter()
        .filter_map(|i| i.render(consent))
        .collect()
}

/// Container/measurement ids are interpolated into inline JS, so only
/// `[A-Za-z0-9-]` is accepted.
pub(crate) fn checked_tag_id<'a>(integration: &str, id: Option<&'a str>) -> Option<&'a str> {
    let id = id.map(str::trim).filter(|id| !id.is_empty())?;
    if id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        Some(id)
    } else {
        warn!(integration, id, "refusing to render tag with invalid id");
        None
    }
}
