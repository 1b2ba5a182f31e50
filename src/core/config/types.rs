//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the middleware, service and
//! view helpers consume. Raw TOML deserialization types live in `raw.rs`.

use std::collections::HashMap;
use std::path::PathBuf;

// ── Server ──────────────────────────────────────────────────────────────────

/// Settings for the bundled demo server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the listener to.
    pub bind: String,
    pub log_level: String,
    /// Base directory for relative paths (audit log).
    pub work_dir: PathBuf,
}

// ── Cookies ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    pub(super) fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// How the consent map is written into the cookie value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieEncoding {
    /// Percent-encoded JSON, as `encodeURIComponent(JSON.stringify(..))` produces.
    Raw,
    /// URL-safe base64 of the JSON, no padding.
    Base64,
}

impl CookieEncoding {
    pub(super) fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Some(CookieEncoding::Raw),
            "base64" => Some(CookieEncoding::Base64),
            _ => None,
        }
    }
}

/// Attributes of the consent cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    /// Lifetime in seconds (`Max-Age`).
    pub expiration: u64,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub encoding: CookieEncoding,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,
}

// ── Banner ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerPosition {
    Top,
    Bottom,
}

impl BannerPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            BannerPosition::Top => "top",
            BannerPosition::Bottom => "bottom",
        }
    }
}

/// CSS classes applied to the banner and its buttons.
#[derive(Debug, Clone)]
pub struct BannerStyle {
    pub bar_color: String,
    pub accept_button: String,
    pub reject_button: String,
    pub customize_button: String,
    pub save_customize_button: String,
    pub cancel_customize_button: String,
}

/// User-facing banner strings for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerText {
    pub title: String,
    pub message: String,
    pub accept_text: String,
    pub reject_text: String,
    pub customize_text: String,
    pub policy_link_text: String,
    pub modal_title: String,
    pub modal_message: String,
    pub save_button_text: String,
    pub cancel_button_text: String,
}

/// Partial [`BannerText`] from `[banner.translations.<lang>]`.
#[derive(Debug, Clone, Default)]
pub struct BannerTextOverrides {
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

#[derive(Debug, Clone)]
pub struct BannerConfig {
    pub position: BannerPosition,
    pub style: BannerStyle,
    /// Show the "Customize" button and the per-category modal.
    pub customizable: bool,
    /// Delay before the client script reveals the banner.
    pub bar_timeout_ms: u64,
    pub cookie_policy_link: Option<String>,
    pub more_link: Option<String>,
    pub stylesheet_url: Option<String>,
    pub script_url: Option<String>,
    pub text: BannerText,
    /// Keyed by lowercase primary language subtag (`"fr"`, `"de"`).
    pub translations: HashMap<String, BannerTextOverrides>,
}

impl BannerConfig {
    /// Banner strings for `locale`, with any matching translation applied
    /// over the base text. `"fr_FR"`, `"fr-CA"` and `"fr"` all select `fr`.
    pub fn text_for(&self, locale: &str) -> BannerText {
        let lang = primary_language(locale);
        let mut text = self.text.clone();
        let Some(o) = self.translations.get(&lang) else {
            return text;
        };
        let apply = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                *slot = v.clone();
            }
        };
        apply(&mut text.title, &o.title);
        apply(&mut text.message, &o.message);
        apply(&mut text.accept_text, &o.accept_text);
        apply(&mut text.reject_text, &o.reject_text);
        apply(&mut text.customize_text, &o.customize_text);
        apply(&mut text.policy_link_text, &o.policy_link_text);
        apply(&mut text.modal_title, &o.modal_title);
        apply(&mut text.modal_message, &o.modal_message);
        apply(&mut text.save_button_text, &o.save_button_text);
        apply(&mut text.cancel_button_text, &o.cancel_button_text);
        text
    }
}

/// Lowercase primary subtag of a locale (`"en_US"` → `"en"`).
pub fn primary_language(locale: &str) -> String {
    locale
        .split(['_', '-'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// ── Compliance / geo / logging ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ComplianceConfig {
    pub gdpr: bool,
    pub cpra: bool,
    /// Emit Google Consent Mode defaults (requires `google.enable_consent_mode`).
    pub google_cmp: bool,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub enabled: bool,
    /// Region codes (`"EU"`, `"US-CA"`, …) where the banner applies.
    pub regions: Vec<String>,
    /// Base URL of the ipapi-compatible country lookup service.
    pub lookup_url: String,
    pub timeout_seconds: u64,
    /// Take the client IP from the first `X-Forwarded-For` hop.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone)]
pub struct AuditLogConfig {
    pub enabled: bool,
    /// Resolved against `server.work_dir`.
    pub path: PathBuf,
    /// Store a SHA-256 prefix instead of the raw client IP.
    pub anonymize_ip: bool,
}

#[derive(Debug, Clone)]
pub struct MultilingualConfig {
    pub enabled: bool,
    pub fallback_locale: String,
    pub supported_langs: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    /// Serve a generated cookie policy page.
    pub generator: bool,
}

// ── Google ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct GoogleConfig {
    pub enable_consent_mode: bool,
    pub enable_gtm: bool,
    pub gtm_id: Option<String>,
    pub enable_ga4: bool,
    pub ga4_id: Option<String>,
}

/// Which Google Consent Mode signals are emitted.
#[derive(Debug, Clone)]
pub struct ConsentFlags {
    pub functional_storage: bool,
    pub analytics_storage: bool,
    pub marketing_storage: bool,
    pub personalization_storage: bool,
    pub security_storage: bool,
    pub marketing_user_data: bool,
    pub marketing_personalization: bool,
}

impl Default for ConsentFlags {
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

/// A named class of cookies/scripts the visitor accepts or rejects as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub key: String,
    pub label: String,
    pub description: String,
    /// Essential categories cannot be declined and are never blocked.
    pub required: bool,
    /// Cookie names set by this category. A trailing `_` matches as a prefix.
    pub cookies: Vec<String>,
    pub services: Vec<String>,
}

impl CategoryConfig {
    /// Whether a cookie named `name` belongs to this category.
    pub fn owns_cookie(&self, name: &str) -> bool {
        if name == self.key {
            return true;
        }
        self.cookies.iter().any(|c| {
            if c.ends_with('_') {
                name.starts_with(c.as_str())
            } else {
                name == c
            }
        })
    }
}

// ── Top-level ───────────────────────────────────────────────────────────────

/// Everything the consent layer needs at request time.
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    pub enabled: bool,
    pub cookie: CookieConfig,
    pub session: SessionConfig,
    pub banner: BannerConfig,
    pub compliance: ComplianceConfig,
    pub geo: GeoConfig,
    pub logging: AuditLogConfig,
    pub multilingual: MultilingualConfig,
    pub policy: PolicyConfig,
    pub google: GoogleConfig,
    pub consent_flags: ConsentFlags,
    /// Ordered as declared; drives banner and policy rendering.
    pub categories: Vec<CategoryConfig>,
}

impl ConsentConfig {
    pub fn category(&self, key: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn required_categories(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories.iter().filter(|c| c.required)
    }

    pub fn optional_categories(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories.iter().filter(|c| !c.required)
    }

    /// First category (in declaration order) claiming the cookie `name`.
    pub fn category_of_cookie(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.owns_cookie(name))
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub consent: ConsentConfig,
}
