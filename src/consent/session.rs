//! Server-side session storage for consent decisions.
//!
//! The host application may provide its own [`SessionStore`]; the bundled
//! [`MemorySessionStore`] keeps maps in process memory, capped by entry
//! count (FIFO, oldest sessions dropped first).

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::AppError;

use super::ConsentMap;

/// Default maximum number of sessions held before FIFO eviction.
const DEFAULT_SESSION_CAP: usize = 10_000;

/// Opaque session identifier carried in the session cookie (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept only well-formed UUIDs so arbitrary cookie text never becomes a key.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(|u| Self(u.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where consent maps live between requests.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId) -> Result<Option<ConsentMap>, AppError>;
    fn store(&self, id: &SessionId, consent: &ConsentMap) -> Result<(), AppError>;

    /// Load, modify and store one session map, returning the stored map.
    /// Stores that can hold a lock across the round trip should override this.
    fn update(
        &self,
        id: &SessionId,
        apply: &mut dyn FnMut(&mut ConsentMap),
    ) -> Result<ConsentMap, AppError> {
        let mut consent = self.load(id)?.unwrap_or_default();
        apply(&mut consent);
        self.store(id, &consent)?;
        Ok(consent)
    }
}

struct Sessions {
    order: VecDeque<SessionId>,
    values: HashMap<SessionId, ConsentMap>,
}

impl Sessions {
    fn insert(&mut self, cap: usize, id: &SessionId, consent: ConsentMap) {
        if self.values.insert(id.clone(), consent).is_none() {
            self.order.push_back(id.clone());
        }
        while self.order.len() > cap {
            if let Some(oldest) = self.order.pop_front() {
                self.values.remove(&oldest);
            }
        }
    }
}

pub struct MemorySessionStore {
    cap: usize,
    inner: Mutex<Sessions>,
}

impl MemorySessionStore {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            cap: cap.unwrap_or(DEFAULT_SESSION_CAP).max(1),
            inner: Mutex::new(Sessions {
                order: VecDeque::new(),
                values: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Sessions>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Session("session store lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<ConsentMap>, AppError> {
        Ok(self.lock()?.values.get(id).cloned())
    }

    fn store(&self, id: &SessionId, consent: &ConsentMap) -> Result<(), AppError> {
        self.lock()?.insert(self.cap, id, consent.clone());
        Ok(())
    }

    fn update(
        &self,
        id: &SessionId,
        apply: &mut dyn FnMut(&mut ConsentMap),
    ) -> Result<ConsentMap, AppError> {
        let mut sessions = self.lock()?;
        let mut consent = sessions.values.get(id).cloned().unwrap_or_default();
        apply(&mut consent);
        sessions.insert(self.cap, id, consent.clone());
        Ok(consent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(category: &str, granted: bool) -> ConsentMap {
        let mut m = ConsentMap::new();
        m.set(category, granted);
        m
    }

    #[test]
    fn session_id_rejects_garbage() {
        assert!(SessionId::parse("not-a-uuid").is_none());
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn store_then_load() {
        let store = MemorySessionStore::default();
        let id = SessionId::generate();
        assert!(store.load(&id).unwrap().is_none());
        store.store(&id, &map("marketing", true)).unwrap();
        assert!(store.load(&id).unwrap().unwrap().is_granted("marketing"));
    }

    #[test]
    fn overwrite_keeps_single_entry() {
        let store = MemorySessionStore::default();
        let id = SessionId::generate();
        store.store(&id, &map("marketing", true)).unwrap();
        store.store(&id, &map("marketing", false)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&id).unwrap().unwrap().get("marketing"), Some(false));
    }

    #[test]
    fn update_applies_in_place() {
        let store = MemorySessionStore::default();
        let id = SessionId::generate();
        store.store(&id, &map("statistics", true)).unwrap();
        let updated = store.update(&id, &mut |m: &mut ConsentMap| m.set("marketing", false)).unwrap();
        assert_eq!(updated.get("statistics"), Some(true));
        assert_eq!(updated.get("marketing"), Some(false));
        assert_eq!(store.load(&id).unwrap(), Some(updated));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn oldest_session_evicted_at_cap() {
        let store = MemorySessionStore::new(Some(2));
        let a = SessionId::generate();
        let b = SessionId::generate();
        let c = SessionId::generate();
        store.store(&a, &map("x", true)).unwrap();
        store.store(&b, &map("x", true)).unwrap();
        store.store(&c, &map("x", true)).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.load(&a).unwrap().is_none());
        assert!(store.load(&c).unwrap().is_some());
    }
}
