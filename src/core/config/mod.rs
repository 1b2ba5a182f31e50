//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `COOKIE_CONSENT_*` env overrides. Without a config file the
//! built-in [`fallback`] is used: the layer is mounted but stays inert.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs (`Config`, `ConsentConfig`,
//!   `CategoryConfig`, …).
//! - **raw**: Raw TOML deserialization types. These mirror the file shape
//!   and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `fallback`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{Overrides, expand_home, fallback, load, load_from, load_str};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Enabled config with the four usual categories, GTM + GA4 configured,
    /// geo-targeting and audit logging off.
    pub fn test_default() -> Self {
        let mut config = fallback().expect("built-in defaults resolve");
        config.consent.enabled = true;
        config.consent.banner.customizable = true;
        config.consent.google = GoogleConfig {
            enable_consent_mode: false,
            enable_gtm: true,
            gtm_id: Some("GTM-TEST01".into()),
            enable_ga4: true,
            ga4_id: Some("G-TEST0001".into()),
        };
        config.consent.categories = vec![
            test_category("essential", true, &["session_id", "csrfToken"]),
            test_category("preferences", false, &["theme"]),
            test_category("statistics", false, &["_ga", "_gid"]),
            test_category("marketing", false, &["_fbp", "_dc_gtm_"]),
        ];
        config
    }
}

#[cfg(test)]
fn test_category(key: &str, required: bool, cookies: &[&str]) -> CategoryConfig {
    CategoryConfig {
        key: key.into(),
        label: key.to_uppercase(),
        description: format!("{key} cookies"),
        required,
        cookies: cookies.iter().map(|c| c.to_string()).collect(),
        services: Vec::new(),
    }
}
