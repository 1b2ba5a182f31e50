//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use std::collections::HashMap;

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, the serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub server: RawServer,
    #[serde(default)]
    pub consent: RawConsent,
    #[serde(default)]
    pub cookie: RawCookie,
    #[serde(default)]
    pub session: RawSession,
    #[serde(default)]
    pub banner: RawBanner,
    #[serde(default)]
    pub compliance: RawCompliance,
    #[serde(default)]
    pub geo_targeting: RawGeoTargeting,
    #[serde(default)]
    pub logging: RawLogging,
    #[serde(default)]
    pub multilingual: RawMultilingual,
    #[serde(default)]
    pub cookie_policy: RawCookiePolicy,
    #[serde(default)]
    pub google: RawGoogle,
    #[serde(default)]
    pub consent_flags: RawConsentFlags,
    #[serde(default)]
    pub categories: Vec<RawCategory>,
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
            work_dir: default_work_dir(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawConsent {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RawConsent {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ── Cookies / session ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawCookie {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    /// Lifetime in seconds.
    #[serde(default = "default_cookie_expiration")]
    pub expiration: u64,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_false")]
    pub secure: bool,
    #[serde(default = "default_false")]
    pub http_only: bool,
    #[serde(default = "default_same_site")]
    pub same_site: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for RawCookie {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            expiration: default_cookie_expiration(),
            path: default_cookie_path(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: default_same_site(),
            encoding: default_encoding(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawSession {
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,
}

impl Default for RawSession {
    fn default() -> Self {
        Self { cookie_name: default_session_cookie_name() }
    }
}

// ── Banner ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawBanner {
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_true")]
    pub customizable: bool,
    #[serde(default = "default_bar_timeout_ms")]
    pub bar_timeout_ms: u64,
    #[serde(default)]
    pub cookie_policy_link: Option<String>,
    #[serde(default)]
    pub more_link: Option<String>,
    #[serde(default = "default_stylesheet_url")]
    pub stylesheet_url: Option<String>,
    #[serde(default = "default_script_url")]
    pub script_url: Option<String>,
    #[serde(default = "default_banner_title")]
    pub title: String,
    #[serde(default = "default_banner_message")]
    pub message: String,
    #[serde(default = "default_accept_text")]
    pub accept_text: String,
    #[serde(default = "default_reject_text")]
    pub reject_text: String,
    #[serde(default = "default_customize_text")]
    pub customize_text: String,
    #[serde(default = "default_policy_link_text")]
    pub policy_link_text: String,
    #[serde(default)]
    pub style: RawBannerStyle,
    #[serde(default)]
    pub modal: RawBannerModal,
    /// `[banner.translations.<lang>]`: per-language string overrides.
    #[serde(default)]
    pub translations: HashMap<String, RawBannerTranslation>,
}

impl Default for RawBanner {
    fn default() -> Self {
        Self {
            position: default_position(),
            customizable: true,
            bar_timeout_ms: default_bar_timeout_ms(),
            cookie_policy_link: None,
            more_link: None,
            stylesheet_url: default_stylesheet_url(),
            script_url: default_script_url(),
            title: default_banner_title(),
            message: default_banner_message(),
            accept_text: default_accept_text(),
            reject_text: default_reject_text(),
            customize_text: default_customize_text(),
            policy_link_text: default_policy_link_text(),
            style: RawBannerStyle::default(),
            modal: RawBannerModal::default(),
            translations: HashMap::new(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawBannerStyle {
    #[serde(default = "default_bar_color")]
    pub bar_color: String,
    #[serde(default = "default_button_class")]
    pub accept_button: String,
    #[serde(default = "default_button_class")]
    pub reject_button: String,
    #[serde(default = "default_button_class")]
    pub customize_button: String,
    #[serde(default = "default_save_button_class")]
    pub save_customize_button: String,
    #[serde(default = "default_button_class")]
    pub cancel_customize_button: String,
}

impl Default for RawBannerStyle {
    fn default() -> Self {
        Self {
            bar_color: default_bar_color(),
            accept_button: default_button_class(),
            reject_button: default_button_class(),
            customize_button: default_button_class(),
            save_customize_button: default_save_button_class(),
            cancel_customize_button: default_button_class(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawBannerModal {
    #[serde(default = "default_modal_title")]
    pub title: String,
    #[serde(default = "default_modal_message")]
    pub message: String,
    #[serde(default = "default_save_text")]
    pub save_button_text: String,
    #[serde(default = "default_cancel_text")]
    pub cancel_button_text: String,
}

impl Default for RawBannerModal {
    fn default() -> Self {
        Self {
            title: default_modal_title(),
            message: default_modal_message(),
            save_button_text: default_save_text(),
            cancel_button_text: default_cancel_text(),
        }
    }
}

#[derive(Deserialize, Default)]
pub(super) struct RawBannerTranslation {
    pub title: Option<String>,
    pub message: Option<String>,
    pub accept_text: Option<String>,
    pub reject_text: Option<String>,
    pub customize_text: Option<String>,
    pub policy_link_text: Option<String>,
    pub modal_title: Option<String>,
    pub modal_message: Option<String>,
    pub save_button_text: Option<String>,
    pub cancel_button_text: Option<String>,
}

// ── Compliance / geo / logging ──────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawCompliance {
    #[serde(default)]
    pub gdpr: bool,
    #[serde(default)]
    pub cpra: bool,
    #[serde(default)]
    pub google_cmp: bool,
}

#[derive(Deserialize)]
pub(super) struct RawGeoTargeting {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,
    #[serde(default = "default_lookup_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_false")]
    pub trust_forwarded_for: bool,
}

impl Default for RawGeoTargeting {
    fn default() -> Self {
        Self {
            enabled: false,
            regions: default_regions(),
            lookup_url: default_lookup_url(),
            timeout_seconds: default_lookup_timeout_seconds(),
            trust_forwarded_for: false,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawLogging {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_log_driver")]
    pub driver: String,
    #[serde(default = "default_log_path")]
    pub path: String,
    #[serde(default = "default_false")]
    pub anonymize_ip: bool,
}

impl Default for RawLogging {
    fn default() -> Self {
        Self {
            enabled: false,
            driver: default_log_driver(),
            path: default_log_path(),
            anonymize_ip: false,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawMultilingual {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_fallback_locale")]
    pub fallback_locale: String,
    #[serde(default)]
    pub supported_langs: Vec<String>,
}

impl Default for RawMultilingual {
    fn default() -> Self {
        Self {
            enabled: false,
            fallback_locale: default_fallback_locale(),
            supported_langs: Vec::new(),
        }
    }
}

#[derive(Deserialize, Default)]
pub(super) struct RawCookiePolicy {
    #[serde(default)]
    pub generator: bool,
}

// ── Google ──────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawGoogle {
    #[serde(default)]
    pub enable_consent_mode: bool,
    #[serde(default)]
    pub enable_gtm: bool,
    #[serde(default)]
    pub gtm_id: Option<String>,
    #[serde(default)]
    pub enable_ga4: bool,
    #[serde(default)]
    pub ga4_id: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct RawConsentFlags {
    #[serde(default = "default_true")]
    pub functional_storage: bool,
    #[serde(default = "default_true")]
    pub analytics_storage: bool,
    #[serde(default = "default_true")]
    pub marketing_storage: bool,
    #[serde(default = "default_true")]
    pub personalization_storage: bool,
    #[serde(default = "default_true")]
    pub security_storage: bool,
    #[serde(default = "default_true")]
    pub marketing_user_data: bool,
    #[serde(default = "default_true")]
    pub marketing_personalization: bool,
}

impl Default for RawConsentFlags {
    fn default() -> Self {
        Self {
            functional_storage: true,
            analytics_storage: true,
            marketing_storage: true,
            personalization_storage: true,
            security_storage: true,
            marketing_user_data: true,
            marketing_personalization: true,
        }
    }
}

// ── Categories ──────────────────────────────────────────────────────────────

/// One `[[categories]]` entry.
#[derive(Deserialize)]
pub(super) struct RawCategory {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub cookies: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_bind() -> String { "127.0.0.1:8080".to_string() }
pub(super) fn default_log_level() -> String { "info".to_string() }
pub(super) fn default_work_dir() -> String { ".".to_string() }
pub(super) fn default_cookie_name() -> String { "cookie_consent".to_string() }
pub(super) fn default_cookie_expiration() -> u64 { 365 * 24 * 3600 }
pub(super) fn default_cookie_path() -> String { "/".to_string() }
pub(super) fn default_same_site() -> String { "Lax".to_string() }
pub(super) fn default_encoding() -> String { "raw".to_string() }
pub(super) fn default_session_cookie_name() -> String { "consent_session".to_string() }
pub(super) fn default_position() -> String { "bottom".to_string() }
pub(super) fn default_bar_timeout_ms() -> u64 { 1000 }
pub(super) fn default_stylesheet_url() -> Option<String> { Some("/cookie-consent/css/cookie-consent.css".to_string()) }
pub(super) fn default_script_url() -> Option<String> { Some("/cookie-consent/js/cookie-consent.js".to_string()) }
pub(super) fn default_banner_title() -> String { "This site uses cookies".to_string() }
pub(super) fn default_banner_message() -> String {
    "We use cookies to personalise content and ads, to provide social media features \
     and to analyse our traffic."
        .to_string()
}
pub(super) fn default_accept_text() -> String { "Accept All".to_string() }
pub(super) fn default_reject_text() -> String { "Reject All".to_string() }
pub(super) fn default_customize_text() -> String { "Customize".to_string() }
pub(super) fn default_policy_link_text() -> String { "Check cookie policy".to_string() }
pub(super) fn default_bar_color() -> String { "bg-white text-dark".to_string() }
pub(super) fn default_button_class() -> String { "btn btn-light".to_string() }
pub(super) fn default_save_button_class() -> String { "btn btn-success".to_string() }
pub(super) fn default_modal_title() -> String { "Customize Cookie Preferences".to_string() }
pub(super) fn default_modal_message() -> String {
    "Choose which categories of cookies this site may store in your browser.".to_string()
}
pub(super) fn default_save_text() -> String { "Save Preferences".to_string() }
pub(super) fn default_cancel_text() -> String { "Cancel".to_string() }
pub(super) fn default_regions() -> Vec<String> { vec!["EU".to_string(), "US-CA".to_string()] }
pub(super) fn default_lookup_url() -> String { "https://ipapi.co".to_string() }
pub(super) fn default_lookup_timeout_seconds() -> u64 { 3 }
pub(super) fn default_log_driver() -> String { "file".to_string() }
pub(super) fn default_log_path() -> String { "logs/cookie_consent.log".to_string() }
pub(super) fn default_fallback_locale() -> String { "en_US".to_string() }

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}
