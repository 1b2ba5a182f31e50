//! ipapi.co-compatible lookup: plain-text `/{ip}/country/` and
//! `/{ip}/region_code/` endpoints.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::GeoConfig;
use crate::error::AppError;

use super::{CountryLookup, GeoLocation, LookupFuture};

/// Upper bound on cached addresses; the cache is cleared when reached.
const CACHE_LIMIT: usize = 4096;

pub struct IpApiLookup {
    client: Client,
    base_url: String,
    cache: Mutex<HashMap<IpAddr, GeoLocation>>,
}

impl IpApiLookup {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()
            .map_err(|e| AppError::Geo(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &GeoConfig) -> Result<Self, AppError> {
        Self::new(&config.lookup_url, config.timeout_seconds)
    }

    async fn fetch_field(&self, ip: IpAddr, field: &str) -> Option<String> {
        let url = format!("{}/{ip}/{field}/", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%ip, field, error = %e, "geo lookup request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(%ip, field, status = %response.status(), "geo lookup rejected");
            return None;
        }
        let body = response.text().await.ok()?;
        let value = body.trim();
        // Plain two-letter codes only; error bodies and "Undefined" are unknown.
        if value.len() == 2 && value.bytes().all(|b| b.is_ascii_alphabetic()) {
            Some(value.to_ascii_uppercase())
        } else {
            None
        }
    }

    fn cached(&self, ip: IpAddr) -> Option<GeoLocation> {
        self.cache.lock().ok()?.get(&ip).cloned()
    }

    fn remember(&self, ip: IpAddr, location: &GeoLocation) {
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= CACHE_LIMIT {
                cache.clear();
            }
            cache.insert(ip, location.clone());
        }
    }
}

impl CountryLookup for IpApiLookup {
    fn lookup(&self, ip: IpAddr) -> LookupFuture<'_> {
        Box::pin(async move {
            if let Some(hit) = self.cached(ip) {
                return Some(hit);
            }
            let country = self.fetch_field(ip, "country").await?;
            let region_code = if country == "US" {
                self.fetch_field(ip, "region_code").await
            } else {
                None
            };
            let location = GeoLocation::new(&country, region_code.as_deref());
            self.remember(ip, &location);
            Some(location)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let lookup = IpApiLookup::new("https://ipapi.co/", 3).unwrap();
        assert_eq!(lookup.base_url, "https://ipapi.co");
    }

    #[test]
    fn cache_returns_remembered_location() {
        let lookup = IpApiLookup::new("http://127.0.0.1:9", 1).unwrap();
        let ip: IpAddr = "203.0.113.1".parse().unwrap();
        assert!(lookup.cached(ip).is_none());
        lookup.remember(ip, &GeoLocation::new("FR", None));
        assert_eq!(lookup.cached(ip), Some(GeoLocation::new("FR", None)));
    }

    #[tokio::test]
    async fn cached_lookup_skips_network() {
        let lookup = IpApiLookup::new("http://127.0.0.1:9", 1).unwrap();
        let ip: IpAddr = "203.0.113.2".parse().unwrap();
        lookup.remember(ip, &GeoLocation::new("US", Some("CA")));
        assert_eq!(lookup.lookup(ip).await, Some(GeoLocation::new("US", Some("CA"))));
    }
}
