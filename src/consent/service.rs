//! Consent state service: session-backed reads and writes, audit logging,
//! cookie scanning and regulation checks.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ConsentConfig;
use crate::error::AppError;

use super::audit::{AuditEntry, ConsentLog};
use super::{ConsentMap, RequestCookies, SessionId, SessionStore};

/// Category key CPRA treats as the "Do Not Sell" opt-out.
const DO_NOT_SELL: &str = "do_not_sell";

/// A privacy regulation the compliance check understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regulation {
    Gdpr,
    Cpra,
    Other(String),
}

impl From<&str> for Regulation {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "gdpr" => Regulation::Gdpr,
            "cpra" => Regulation::Cpra,
            other => Regulation::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Regulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regulation::Gdpr => f.write_str("gdpr"),
            Regulation::Cpra => f.write_str("cpra"),
            Regulation::Other(name) => f.write_str(name),
        }
    }
}

/// A cookie seen on the request, attributed to a category when possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedCookie {
    pub value: String,
    /// Label of the owning category.
    pub category: Option<String>,
}

pub struct ConsentService {
    config: Arc<ConsentConfig>,
    sessions: Arc<dyn SessionStore>,
    log: Option<ConsentLog>,
}

impl ConsentService {
    pub fn new(config: Arc<ConsentConfig>, sessions: Arc<dyn SessionStore>) -> Self {
        let log = config
            .logging
            .enabled
            .then(|| ConsentLog::from_config(&config.logging));
        Self {
            config,
            sessions,
            log,
        }
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    /// Consent recorded in the session for `category`. Store failures count
    /// as "not given".
    pub fn has_consent(&self, session: &SessionId, category: &str) -> bool {
        match self.sessions.load(session) {
            Ok(Some(map)) => map.is_granted(category),
            Ok(None) => false,
            Err(e) => {
                warn!(%session, "session lookup failed: {e}");
                false
            }
        }
    }

    /// Session decisions for every configured category, `None` when the
    /// session has nothing recorded.
    pub fn session_consent(&self, session: &SessionId) -> Option<ConsentMap> {
        match self.sessions.load(session) {
            Ok(Some(map)) if !map.is_empty() => Some(
                self.config
                    .categories
                    .iter()
                    .map(|c| (c.key.clone(), map.is_granted(&c.key)))
                    .collect(),
            ),
            Ok(_) => None,
            Err(e) => {
                warn!(%session, "session lookup failed: {e}");
                None
            }
        }
    }

    /// Record a decision in the session and, when enabled, the audit log.
    pub fn set_consent(
        &self,
        session: &SessionId,
        category: &str,
        value: bool,
        ip: Option<IpAddr>,
    ) -> Result<(), AppError> {
        self.record_decisions(session, None, &[(category.to_string(), value)], ip)
            .map(|_| ())
    }

    /// Apply `decisions` in order as one session update and return the
    /// stored map. A session with nothing recorded starts from `seed`
    /// (normally the consent cookie), restricted to configured categories.
    pub fn record_decisions(
        &self,
        session: &SessionId,
        seed: Option<ConsentMap>,
        decisions: &[(String, bool)],
        ip: Option<IpAddr>,
    ) -> Result<ConsentMap, AppError> {
        let mut seed = seed.map(|cookie| {
            cookie
                .iter()
                .filter(|(key, _)| self.config.category(key).is_some())
                .map(|(key, granted)| (key.to_string(), granted))
                .collect::<ConsentMap>()
        });
        let consent = self.sessions.update(session, &mut |map: &mut ConsentMap| {
            if map.is_empty() {
                if let Some(seed) = seed.take() {
                    *map = seed;
                }
            }
            for (category, value) in decisions {
                map.set(category.clone(), *value);
            }
        })?;
        debug!(%session, decisions = decisions.len(), "consent recorded");

        if let Some(log) = &self.log {
            for (category, value) in decisions {
                if let Err(e) = log.append(&log.entry(category, *value, ip)) {
                    warn!(category = %category, "consent audit write failed: {e}");
                }
            }
        }
        Ok(consent)
    }

    /// Consent from the consent cookie, `None` when the cookie is absent.
    pub fn cookie_consent(&self, cookies: &RequestCookies) -> Option<ConsentMap> {
        cookies
            .get(&self.config.cookie.name)
            .map(|raw| ConsentMap::decode_cookie(raw, self.config.cookie.encoding))
    }

    /// Effective consent: the session map when one exists (it was just
    /// written by accept/reject/customize), else the consent cookie, else empty.
    pub fn get_consent(&self, session: Option<&SessionId>, cookies: &RequestCookies) -> ConsentMap {
        if let Some(id) = session {
            match self.sessions.load(id) {
                Ok(Some(map)) if !map.is_empty() => return map,
                Ok(_) => {}
                Err(e) => warn!(session = %id, "session lookup failed: {e}"),
            }
        }
        self.cookie_consent(cookies).unwrap_or_default()
    }

    /// Audit log entries, oldest first. Empty when logging is disabled.
    pub fn consent_log(&self) -> Result<Vec<AuditEntry>, AppError> {
        match &self.log {
            Some(log) => log.entries(),
            None => Ok(Vec::new()),
        }
    }

    /// Every cookie on the request with the label of the category owning it.
    pub fn scan_cookies(&self, cookies: &RequestCookies) -> BTreeMap<String, ScannedCookie> {
        let mut scanned = BTreeMap::new();
        for (name, value) in cookies.iter() {
            scanned.entry(name.to_string()).or_insert_with(|| ScannedCookie {
                value: value.to_string(),
                category: self
                    .config
                    .category_of_cookie(name)
                    .map(|c| c.label.clone()),
            });
        }
        scanned
    }

    /// Whether the cookies present are covered by `consent` under `regulation`.
    pub fn is_compliant(
        &self,
        regulation: &Regulation,
        consent: &ConsentMap,
        cookies: &RequestCookies,
    ) -> bool {
        match regulation {
            Regulation::Gdpr => self.no_unconsented_cookies(consent, cookies),
            Regulation::Cpra => {
                if self.config.category(DO_NOT_SELL).is_some()
                    && cookies.is_set(DO_NOT_SELL)
                    && !consent.is_granted(DO_NOT_SELL)
                {
                    return false;
                }
                self.no_unconsented_cookies(consent, cookies)
            }
            Regulation::Other(_) => true,
        }
    }

    /// Compliance for every regulation switched on under `[compliance]`.
    pub fn compliance_report(
        &self,
        consent: &ConsentMap,
        cookies: &RequestCookies,
    ) -> BTreeMap<String, bool> {
        let mut report = BTreeMap::new();
        if self.config.compliance.gdpr {
            report.insert(
                Regulation::Gdpr.to_string(),
                self.is_compliant(&Regulation::Gdpr, consent, cookies),
            );
        }
        if self.config.compliance.cpra {
            report.insert(
                Regulation::Cpra.to_string(),
                self.is_compliant(&Regulation::Cpra, consent, cookies),
            );
        }
        report
    }

    /// No non-essential cookie is present without consent for its category.
    fn no_unconsented_cookies(&self, consent: &ConsentMap, cookies: &RequestCookies) -> bool {
        self.config.optional_categories().all(|category| {
            consent.is_granted(&category.key)
                || !cookies
                    .iter()
                    .any(|(name, value)| !value.is_empty() && category.owns_cookie(name))
        })
    }
}
