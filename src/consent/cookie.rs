//! Request `Cookie` parsing and `Set-Cookie` construction.
//!
//! Cookie values are kept as the raw header text; decoding is up to the
//! consumer ([`ConsentMap::decode_cookie`](super::ConsentMap::decode_cookie)).

use std::collections::HashSet;

use axum::http::{HeaderMap, header};

use crate::config::{CookieConfig, SameSite};

/// Expiry date sent alongside `Max-Age=0` for older user agents.
const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// The cookies a request carried, in header order.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    pairs: Vec<(String, String)>,
}

impl RequestCookies {
    /// Collect cookies from every `Cookie` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();
        for value in headers.get_all(header::COOKIE) {
            if let Ok(s) = value.to_str() {
                cookies.extend_from_header(s);
            }
        }
        cookies
    }

    /// Parse a single `Cookie` header value (`a=1; b=2`).
    pub fn parse(header_value: &str) -> Self {
        let mut cookies = Self::default();
        cookies.extend_from_header(header_value);
        cookies
    }

    fn extend_from_header(&mut self, header_value: &str) {
        for part in header_value.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((name, value)) = part.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.pairs.push((name.to_string(), value.trim().to_string()));
                }
            }
        }
    }

    /// Value of the first cookie named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Present with a non-empty value.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Rebuild a `Cookie` header value with the `removed` names left out.
    /// `None` when nothing is left.
    pub fn header_without(&self, removed: &HashSet<String>) -> Option<String> {
        let kept: Vec<String> = self
            .pairs
            .iter()
            .filter(|(n, _)| !removed.contains(n))
            .map(|(n, v)| format!("{n}={v}"))
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(kept.join("; "))
        }
    }
}

/// Attributes shared by every cookie the layer writes.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl From<&CookieConfig> for CookieAttributes {
    fn from(c: &CookieConfig) -> Self {
        Self {
            path: c.path.clone(),
            domain: c.domain.clone(),
            secure: c.secure,
            http_only: c.http_only,
            same_site: c.same_site,
        }
    }
}

impl CookieAttributes {
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    fn write_into(&self, out: &mut String) {
        out.push_str("; Path=");
        out.push_str(&self.path);
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        // SameSite=None is rejected by browsers unless Secure is set.
        if self.secure || self.same_site == SameSite::None {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out.push_str("; SameSite=");
        out.push_str(self.same_site.as_str());
    }
}

/// `Set-Cookie` value. `max_age = None` produces a browser-session cookie.
pub fn set_cookie(name: &str, value: &str, attrs: &CookieAttributes, max_age: Option<u64>) -> String {
    let mut out = format!("{name}={value}");
    if let Some(secs) = max_age {
        out.push_str(&format!("; Max-Age={secs}"));
    }
    attrs.write_into(&mut out);
    out
}

/// `Set-Cookie` value that deletes `name` in the browser.
pub fn expire_cookie(name: &str, attrs: &CookieAttributes) -> String {
    let mut out = format!("{name}=; Max-Age=0; Expires={EPOCH_HTTP_DATE}");
    attrs.write_into(&mut out);
    out
}
