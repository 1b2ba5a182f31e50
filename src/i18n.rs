//! `Accept-Language` negotiation for banner strings.

use crate::config::{MultilingualConfig, primary_language};

/// Pick the best supported locale for an `Accept-Language` header.
///
/// Entries are ranked by q-value (ties keep header order) and matched on the
/// primary language subtag, so `fr-CA` selects a supported `fr_FR`. Entries
/// with `q=0` are ignored. Returns `fallback` when nothing matches.
pub fn negotiate_locale(accept_language: Option<&str>, supported: &[String], fallback: &str) -> String {
    let Some(header) = accept_language else {
        return fallback.to_string();
    };

    let mut ranked: Vec<(f32, usize, String)> = header
        .split(',')
        .enumerate()
        .filter_map(|(pos, item)| {
            let mut parts = item.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let q = parts
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (q > 0.0).then(|| (q, pos, primary_language(tag)))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    for (_, _, lang) in ranked {
        if lang == "*" {
            break;
        }
        if let Some(found) = supported.iter().find(|s| primary_language(s) == lang) {
            return found.clone();
        }
    }
    fallback.to_string()
}

/// Locale for a request under `config`; the fallback when multilingual
/// support is off.
pub fn request_locale(config: &MultilingualConfig, accept_language: Option<&str>) -> String {
    if !config.enabled {
        return config.fallback_locale.clone();
    }
    negotiate_locale(accept_language, &config.supported_langs, &config.fallback_locale)
}
