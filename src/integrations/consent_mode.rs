//! Google Consent Mode v2 defaults derived from the consent map.

use serde_json::{Map, Value};

use crate::config::{ConsentConfig, ConsentFlags};
use crate::consent::{ConsentMap, CookieBlocker};

#[derive(Debug, Clone)]
pub struct ConsentModeIntegration {
    enabled: bool,
    flags: ConsentFlags,
}

impl ConsentModeIntegration {
    /// Active only when both `compliance.google_cmp` and
    /// `google.enable_consent_mode` are set.
    pub fn new(config: &ConsentConfig) -> Self {
        Self {
            enabled: config.compliance.google_cmp && config.google.enable_consent_mode,
            flags: config.consent_flags.clone(),
        }
    }

    /// Consent Mode signal → granted/denied for `consent`.
    pub fn signals(&self, consent: &ConsentMap) -> Map<String, Value> {
        let blocker = CookieBlocker::new(consent);
        let state = |granted: bool| Value::from(if granted { "granted" } else { "denied" });
        let preferences = blocker.allow("preferences");
        let statistics = blocker.allow("statistics");
        let marketing = blocker.allow("marketing");

        let f = &self.flags;
        let mut signals = Map::new();
        let mut put = |enabled: bool, name: &str, granted: bool| {
            if enabled {
                signals.insert(name.to_string(), state(granted));
            }
        };
        put(f.functional_storage, "functionality_storage", preferences);
        put(f.personalization_storage, "personalization_storage", preferences);
        put(f.analytics_storage, "analytics_storage", statistics);
        put(f.marketing_storage, "ad_storage", marketing);
        put(f.marketing_user_data, "ad_user_data", marketing);
        put(f.marketing_personalization, "ad_personalization", marketing);
        put(f.security_storage, "security_storage", true);
        signals
    }
}

impl super::ScriptIntegration for ConsentModeIntegration {
    fn id(&self) -> &str {
        "consent_mode"
    }

    fn render(&self, consent: &ConsentMap) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let signals = Value::Object(self.signals(consent));
        Some(format!(
            "<script>\nwindow.dataLayer = window.dataLayer || [];\nfunction gtag(){{dataLayer.push(arguments);}}\ngtag('consent', 'default', {signals});\n</script>"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::integrations::ScriptIntegration;

    fn enabled() -> ConsentModeIntegration {
        let mut config = Config::test_default().consent;
        config.compliance.google_cmp = true;
        config.google.enable_consent_mode = true;
        ConsentModeIntegration::new(&config)
    }

    #[test]
    fn signals_map_categories() {
        let mut consent = ConsentMap::new();
        consent.set("statistics", true);
        let s = enabled().signals(&consent);
        assert_eq!(s["analytics_storage"], "granted");
        assert_eq!(s["ad_storage"], "denied");
        assert_eq!(s["ad_user_data"], "denied");
        assert_eq!(s["functionality_storage"], "denied");
        assert_eq!(s["security_storage"], "granted");
    }

    #[test]
    fn flags_drop_signals() {
        let mut integration = enabled();
        integration.flags.marketing_user_data = false;
        let s = integration.signals(&ConsentMap::new());
        assert!(!s.contains_key("ad_user_data"));
        assert!(s.contains_key("ad_storage"));
    }

    #[test]
    fn needs_both_switches() {
        let mut config = Config::test_default().consent;
        config.compliance.google_cmp = true;
        assert!(ConsentModeIntegration::new(&config).render(&ConsentMap::new()).is_none());
        let out = enabled().render(&ConsentMap::new()).unwrap();
        assert!(out.contains("\"analytics_storage\":\"denied\""));
    }
}
