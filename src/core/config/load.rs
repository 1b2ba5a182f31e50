//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `COOKIE_CONSENT_BIND`, `COOKIE_CONSENT_LOG_LEVEL` and
//! `COOKIE_CONSENT_WORK_DIR` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Env-var overrides applied on top of the file values.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub work_dir: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            bind: env::var("COOKIE_CONSENT_BIND").ok(),
            log_level: env::var("COOKIE_CONSENT_LOG_LEVEL").ok(),
            work_dir: env::var("COOKIE_CONSENT_WORK_DIR").ok(),
        }
    }
}

/// Deep-merge two TOML values.
/// Tables are merged recursively; the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, returns [`fallback`].
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        let mut config = fallback()?;
        apply_overrides(&mut config, &overrides);
        Ok(config)
    }
}

/// Internal loader; accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    resolve(parsed, overrides)
}

/// Parse a TOML string directly. Relative paths resolve against `server.work_dir`.
pub fn load_str(toml_src: &str) -> Result<Config, AppError> {
    let parsed: RawConfig = toml::from_str(toml_src)
        .map_err(|e| AppError::Config(format!("parse error: {e}")))?;
    resolve(parsed, &Overrides::default())
}

/// Built-in configuration used when no config file exists: the layer is
/// installed but disabled, no categories are defined.
pub fn fallback() -> Result<Config, AppError> {
    let mut config = resolve(RawConfig::default(), &Overrides::default())?;
    config.consent.enabled = false;
    config.consent.banner.customizable = false;
    Ok(config)
}

fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(bind) = &overrides.bind {
        config.server.bind = bind.clone();
    }
    if let Some(level) = &overrides.log_level {
        config.server.log_level = level.clone();
    }
    if let Some(dir) = &overrides.work_dir {
        let work_dir = expand_home(dir);
        let log_rel = config
            .consent
            .logging
            .path
            .strip_prefix(&config.server.work_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| config.consent.logging.path.clone());
        config.consent.logging.path = resolve_relative(&work_dir, &log_rel);
        config.server.work_dir = work_dir;
    }
}

fn resolve(parsed: RawConfig, overrides: &Overrides) -> Result<Config, AppError> {
    let s = parsed.server;
    let work_dir_str = overrides.work_dir.as_deref().unwrap_or(&s.work_dir);
    let work_dir = expand_home(work_dir_str);

    let c = parsed.cookie;
    if c.name.trim().is_empty() {
        return Err(AppError::Config("cookie.name must not be empty".into()));
    }
    let same_site = SameSite::parse(&c.same_site).ok_or_else(|| {
        AppError::Config(format!(
            "cookie.same_site must be Strict, Lax or None, got '{}'",
            c.same_site
        ))
    })?;
    let encoding = CookieEncoding::parse(&c.encoding).ok_or_else(|| {
        AppError::Config(format!("cookie.encoding must be raw or base64, got '{}'", c.encoding))
    })?;
    if parsed.session.cookie_name.trim().is_empty() {
        return Err(AppError::Config("session.cookie_name must not be empty".into()));
    }
    if parsed.session.cookie_name == c.name {
        return Err(AppError::Config(
            "session.cookie_name must differ from cookie.name".into(),
        ));
    }

    let b = parsed.banner;
    let position = match b.position.to_ascii_lowercase().as_str() {
        "top" => BannerPosition::Top,
        "bottom" => BannerPosition::Bottom,
        other => {
            return Err(AppError::Config(format!(
                "banner.position must be top or bottom, got '{other}'"
            )));
        }
    };

    if !parsed.logging.driver.eq_ignore_ascii_case("file") {
        return Err(AppError::Config(format!(
            "logging.driver '{}' is not supported (only 'file')",
            parsed.logging.driver
        )));
    }

    let mut seen = HashSet::new();
    let mut categories = Vec::with_capacity(parsed.categories.len());
    for cat in parsed.categories {
        let key = cat.key.trim().to_string();
        if key.is_empty() {
            return Err(AppError::Config("category key must not be empty".into()));
        }
        if !seen.insert(key.clone()) {
            return Err(AppError::Config(format!("duplicate category '{key}'")));
        }
        categories.push(CategoryConfig {
            label: cat.label.unwrap_or_else(|| capitalize(&key)),
            key,
            description: cat.description,
            required: cat.required,
            cookies: cat.cookies,
            services: cat.services,
        });
    }

    let translations = b
        .translations
        .into_iter()
        .map(|(lang, t)| {
            (
                primary_language(&lang),
                BannerTextOverrides {
                    title: t.title,
                    message: t.message,
                    accept_text: t.accept_text,
                    reject_text: t.reject_text,
                    customize_text: t.customize_text,
                    policy_link_text: t.policy_link_text,
                    modal_title: t.modal_title,
                    modal_message: t.modal_message,
                    save_button_text: t.save_button_text,
                    cancel_button_text: t.cancel_button_text,
                },
            )
        })
        .collect();

    let log_path = resolve_relative(&work_dir, Path::new(&parsed.logging.path));

    Ok(Config {
        server: ServerConfig {
            bind: overrides.bind.clone().unwrap_or(s.bind),
            log_level: overrides.log_level.clone().unwrap_or(s.log_level),
            work_dir,
        },
        consent: ConsentConfig {
            enabled: parsed.consent.enabled,
            cookie: CookieConfig {
                name: c.name,
                expiration: c.expiration,
                path: c.path,
                domain: c.domain.filter(|d| !d.is_empty()),
                secure: c.secure,
                http_only: c.http_only,
                same_site,
                encoding,
            },
            session: SessionConfig {
                cookie_name: parsed.session.cookie_name,
            },
            banner: BannerConfig {
                position,
                style: BannerStyle {
                    bar_color: b.style.bar_color,
                    accept_button: b.style.accept_button,
                    reject_button: b.style.reject_button,
                    customize_button: b.style.customize_button,
                    save_customize_button: b.style.save_customize_button,
                    cancel_customize_button: b.style.cancel_customize_button,
                },
                customizable: b.customizable,
                bar_timeout_ms: b.bar_timeout_ms,
                cookie_policy_link: b.cookie_policy_link.filter(|l| !l.is_empty()),
                more_link: b.more_link.filter(|l| !l.is_empty()),
                stylesheet_url: b.stylesheet_url.filter(|l| !l.is_empty()),
                script_url: b.script_url.filter(|l| !l.is_empty()),
                text: BannerText {
                    title: b.title,
                    message: b.message,
                    accept_text: b.accept_text,
                    reject_text: b.reject_text,
                    customize_text: b.customize_text,
                    policy_link_text: b.policy_link_text,
                    modal_title: b.modal.title,
                    modal_message: b.modal.message,
                    save_button_text: b.modal.save_button_text,
                    cancel_button_text: b.modal.cancel_button_text,
                },
                translations,
            },
            compliance: ComplianceConfig {
                gdpr: parsed.compliance.gdpr,
                cpra: parsed.compliance.cpra,
                google_cmp: parsed.compliance.google_cmp,
            },
            geo: GeoConfig {
                enabled: parsed.geo_targeting.enabled,
                regions: parsed.geo_targeting.regions,
                lookup_url: parsed.geo_targeting.lookup_url.trim_end_matches('/').to_string(),
                timeout_seconds: parsed.geo_targeting.timeout_seconds.max(1),
                trust_forwarded_for: parsed.geo_targeting.trust_forwarded_for,
            },
            logging: AuditLogConfig {
                enabled: parsed.logging.enabled,
                path: log_path,
                anonymize_ip: parsed.logging.anonymize_ip,
            },
            multilingual: MultilingualConfig {
                enabled: parsed.multilingual.enabled,
                fallback_locale: parsed.multilingual.fallback_locale,
                supported_langs: parsed.multilingual.supported_langs,
            },
            policy: PolicyConfig {
                generator: parsed.cookie_policy.generator,
            },
            google: GoogleConfig {
                enable_consent_mode: parsed.google.enable_consent_mode,
                enable_gtm: parsed.google.enable_gtm,
                gtm_id: parsed.google.gtm_id.filter(|id| !id.is_empty()),
                enable_ga4: parsed.google.enable_ga4,
                ga4_id: parsed.google.ga4_id.filter(|id| !id.is_empty()),
            },
            consent_flags: ConsentFlags {
                functional_storage: parsed.consent_flags.functional_storage,
                analytics_storage: parsed.consent_flags.analytics_storage,
                marketing_storage: parsed.consent_flags.marketing_storage,
                personalization_storage: parsed.consent_flags.personalization_storage,
                security_storage: parsed.consent_flags.security_storage,
                marketing_user_data: parsed.consent_flags.marketing_user_data,
                marketing_personalization: parsed.consent_flags.marketing_personalization,
            },
            categories,
        },
    })
}

fn resolve_relative(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
