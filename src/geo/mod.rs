//! Visitor region detection for geo-targeted consent.
//!
//! A [`CountryLookup`] resolves an IP to a country (and, for the US, a state
//! code); [`region_for`] folds that into the coarse [`Region`] the consent
//! layer targets.

#[cfg(feature = "geo-ipapi")]
mod ipapi;

#[cfg(feature = "geo-ipapi")]
pub use ipapi::IpApiLookup;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::str::FromStr;

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::debug;

use crate::config::GeoConfig;

/// EEA and EFTA members, all treated as GDPR territory.
const EEA_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE", "IS", "LI", "NO",
    "CH",
];

const FORWARDED_FOR: &str = "x-forwarded-for";

// ── Region ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Region {
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "US-CA")]
    UsCa,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "OTHER")]
    Other,
}

impl Region {
    pub fn code(self) -> &'static str {
        match self {
            Region::Eu => "EU",
            Region::UsCa => "US-CA",
            Region::Us => "US",
            Region::Other => "OTHER",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EU" => Ok(Region::Eu),
            "US-CA" => Ok(Region::UsCa),
            "US" => Ok(Region::Us),
            "OTHER" => Ok(Region::Other),
            other => Err(format!("unknown region code: {other}")),
        }
    }
}

// ── Lookup ──────────────────────────────────────────────────────────────────

/// Result of a country lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoLocation {
    /// ISO 3166-1 alpha-2, uppercase.
    pub country: String,
    /// Subdivision code (`"CA"`), only looked up for the US.
    pub region_code: Option<String>,
}

impl GeoLocation {
    pub fn new(country: &str, region_code: Option<&str>) -> Self {
        Self {
            country: country.trim().to_ascii_uppercase(),
            region_code: region_code.map(|r| r.trim().to_ascii_uppercase()),
        }
    }
}

/// A boxed future returned by [`CountryLookup::lookup`].
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = Option<GeoLocation>> + Send + 'a>>;

/// Resolves an IP address to a country. `None` means "unknown".
pub trait CountryLookup: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> LookupFuture<'_>;
}

/// Fixed IP → location table. Unlisted addresses are unknown.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: HashMap<IpAddr, GeoLocation>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ip: IpAddr, location: GeoLocation) -> Self {
        self.entries.insert(ip, location);
        self
    }
}

impl CountryLookup for StaticLookup {
    fn lookup(&self, ip: IpAddr) -> LookupFuture<'_> {
        let found = self.entries.get(&ip).cloned();
        Box::pin(async move { found })
    }
}

// ── Detection ───────────────────────────────────────────────────────────────

pub fn region_for(location: Option<&GeoLocation>) -> Region {
    let Some(location) = location else {
        return Region::Other;
    };
    if EEA_COUNTRIES.contains(&location.country.as_str()) {
        return Region::Eu;
    }
    if location.country == "US" {
        return match location.region_code.as_deref() {
            Some("CA") => Region::UsCa,
            _ => Region::Us,
        };
    }
    Region::Other
}

/// Region of the visitor at `ip`. Requests without a usable address and
/// loopback requests resolve to `EU` so local development sees the banner.
/// Without a lookup every other address is `OTHER`.
pub async fn detect_region(ip: Option<IpAddr>, lookup: Option<&dyn CountryLookup>) -> Region {
    let ip = match ip {
        Some(ip) if !ip.is_loopback() => ip,
        _ => return Region::Eu,
    };
    let Some(lookup) = lookup else {
        return Region::Other;
    };
    let location = lookup.lookup(ip).await;
    let region = region_for(location.as_ref());
    debug!(%ip, %region, "region detected");
    region
}

/// Whether consent rules apply to `region`. Always true when geo-targeting
/// is off.
pub fn in_target_region(config: &GeoConfig, region: Region) -> bool {
    !config.enabled
        || config
            .regions
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region.code()))
}

/// Client address: the first `X-Forwarded-For` hop when trusted, otherwise
/// the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer
}
