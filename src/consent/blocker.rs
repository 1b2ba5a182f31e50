//! Per-category allow/block decisions derived from a consent map.

use std::collections::HashSet;

use crate::config::ConsentConfig;

use super::{ConsentMap, RequestCookies};

/// Category name that is always allowed, whatever the configuration says.
const ALWAYS_ALLOWED: &str = "necessary";

/// Answers "may this category run?" for one request.
#[derive(Debug, Clone)]
pub struct CookieBlocker<'a> {
    consent: &'a ConsentMap,
}

impl<'a> CookieBlocker<'a> {
    pub fn new(consent: &'a ConsentMap) -> Self {
        Self { consent }
    }

    /// Allowed only when the visitor explicitly granted the category.
    pub fn allow(&self, category: &str) -> bool {
        self.consent.is_granted(category)
    }

    /// Whether scripts of `category` are subject to blocking at all.
    /// Required categories and `necessary` are never blocked.
    pub fn should_block(&self, config: &ConsentConfig, category: &str) -> bool {
        if category == ALWAYS_ALLOWED {
            return false;
        }
        !config.category(category).is_some_and(|c| c.required)
    }
}

/// Names of request cookies owned by a category that `blocker` blocks and
/// the visitor has not granted.
pub fn blockable_cookies(
    config: &ConsentConfig,
    blocker: &CookieBlocker<'_>,
    cookies: &RequestCookies,
) -> HashSet<String> {
    let blocked: Vec<_> = config
        .categories
        .iter()
        .filter(|c| blocker.should_block(config, &c.key) && !blocker.allow(&c.key))
        .collect();
    cookies
        .iter()
        .filter(|(name, value)| !value.is_empty() && *name != config.cookie.name)
        .filter(|(name, _)| blocked.iter().any(|category| category.owns_cookie(name)))
        .map(|(name, _)| name.to_string())
        .collect()
}
