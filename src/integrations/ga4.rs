//! Google Analytics 4 via gtag.js, gated on `statistics` consent.

use crate::config::GoogleConfig;
use crate::consent::{ConsentMap, CookieBlocker};

use super::{ScriptIntegration, checked_tag_id};

const CATEGORY: &str = "statistics";

#[derive(Debug, Clone)]
pub struct Ga4Integration {
    enabled: bool,
    measurement_id: Option<String>,
}

impl Ga4Integration {
    pub fn new(google: &GoogleConfig) -> Self {
        Self {
            enabled: google.enable_ga4,
            measurement_id: google.ga4_id.clone(),
        }
    }
}

impl ScriptIntegration for Ga4Integration {
    fn id(&self) -> &str {
        "ga4"
    }

    fn render(&self, consent: &ConsentMap) -> Option<String> {
        if !self.enabled || !CookieBlocker::new(consent).allow(CATEGORY) {
            return None;
        }
        let id = checked_tag_id(self.id(), self.measurement_id.as_deref())?;
        Some(format!(
            r#"<!-- Google Analytics -->
<script async src="https://www.googletagmanager.com/gtag/js?id={id}"></script>
<script>
window.dataLayer = window.dataLayer || [];
function gtag(){{dataLayer.push(arguments);}}
gtag('js', new Date());
gtag('config', '{id}', {{ 'anonymize_ip': true }});
</script>
<!-- End Google Analytics -->"#
        ))
    }
}
