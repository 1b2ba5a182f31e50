//! The consent map (`category -> granted`) and its cookie encoding.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::CookieEncoding;

/// Flat mapping from category key to the visitor's decision.
///
/// Serialises as a plain JSON object (`{"marketing": true, ...}`), which is
/// exactly what goes into the consent cookie and the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentMap(BTreeMap<String, bool>);

impl ConsentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str) -> Option<bool> {
        self.0.get(category).copied()
    }

    /// `true` only when the category is present and set to `true`.
    pub fn is_granted(&self, category: &str) -> bool {
        self.get(category).unwrap_or(false)
    }

    pub fn set(&mut self, category: impl Into<String>, granted: bool) {
        self.0.insert(category.into(), granted);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from an arbitrary JSON value. Anything but an object yields an
    /// empty map; non-boolean entries are dropped.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self(
            obj.iter()
                .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                .collect(),
        )
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }

    /// Decode a consent cookie value. Malformed input yields an empty map.
    pub fn decode_cookie(raw: &str, encoding: CookieEncoding) -> Self {
        let json = match encoding {
            CookieEncoding::Raw => match urlencoding::decode(raw) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => raw.to_string(),
            },
            CookieEncoding::Base64 => {
                match URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        debug!("consent cookie is not valid base64: {e}");
                        return Self::default();
                    }
                }
            }
        };
        match serde_json::from_str::<Value>(&json) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                debug!("consent cookie is not valid JSON: {e}");
                Self::default()
            }
        }
    }

    /// Encode for a `Set-Cookie` value.
    pub fn encode_cookie(&self, encoding: CookieEncoding) -> String {
        let json = self.to_json().to_string();
        match encoding {
            CookieEncoding::Raw => urlencoding::encode(&json).into_owned(),
            CookieEncoding::Base64 => URL_SAFE_NO_PAD.encode(json.as_bytes()),
        }
    }
}

impl FromIterator<(String, bool)> for ConsentMap {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn granted_requires_literal_true() {
        let map = ConsentMap::from_json(&json!({
            "marketing": true,
            "statistics": false,
            "preferences": 1,
            "essential": "yes",
        }));
        assert!(map.is_granted("marketing"));
        assert!(!map.is_granted("statistics"));
        assert!(!map.is_granted("preferences"));
        assert!(!map.is_granted("missing"));
        // non-bool values are dropped entirely
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn non_object_json_is_empty() {
        assert!(ConsentMap::from_json(&json!([true, false])).is_empty());
        assert!(ConsentMap::from_json(&json!(null)).is_empty());
    }

    #[test]
    fn decodes_browser_encoded_cookie() {
        // encodeURIComponent(JSON.stringify({essential: true, marketing: false}))
        let raw = "%7B%22essential%22%3Atrue%2C%22marketing%22%3Afalse%7D";
        let map = ConsentMap::decode_cookie(raw, CookieEncoding::Raw);
        assert!(map.is_granted("essential"));
        assert_eq!(map.get("marketing"), Some(false));
    }

    #[test]
    fn decodes_unencoded_json_cookie() {
        let map = ConsentMap::decode_cookie(r#"{"statistics":true}"#, CookieEncoding::Raw);
        assert!(map.is_granted("statistics"));
    }

    #[test]
    fn malformed_cookie_is_empty() {
        assert!(ConsentMap::decode_cookie("not-json", CookieEncoding::Raw).is_empty());
        assert!(ConsentMap::decode_cookie("%%%", CookieEncoding::Base64).is_empty());
    }

    #[test]
    fn raw_encoding_is_cookie_safe() {
        let mut map = ConsentMap::new();
        map.set("essential", true);
        map.set("marketing", false);
        let encoded = map.encode_cookie(CookieEncoding::Raw);
        assert!(!encoded.contains([';', ',', '"', ' ']));
        assert_eq!(ConsentMap::decode_cookie(&encoded, CookieEncoding::Raw), map);
    }

    #[test]
    fn base64_encoding_decodes_with_padding() {
        let mut map = ConsentMap::new();
        map.set("statistics", true);
        let encoded = format!("{}==", map.encode_cookie(CookieEncoding::Base64));
        assert_eq!(ConsentMap::decode_cookie(&encoded, CookieEncoding::Base64), map);
    }
}
