//! Consent state: the category map, cookie plumbing, session storage,
//! the audit log and the service tying them together.

pub mod audit;
pub mod blocker;
pub mod cookie;
pub mod map;
pub mod service;
pub mod session;

pub use audit::{AuditEntry, ConsentLog};
pub use blocker::{CookieBlocker, blockable_cookies};
pub use cookie::{CookieAttributes, RequestCookies, expire_cookie, set_cookie};
pub use map::ConsentMap;
pub use service::{ConsentService, Regulation, ScannedCookie};
pub use session::{MemorySessionStore, SessionId, SessionStore};
