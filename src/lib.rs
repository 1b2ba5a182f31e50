//! Cookie consent gate for axum applications.
//!
//! Shows a consent banner, records per-category decisions in the visitor's
//! session and a consent cookie, injects analytics/marketing tags only after
//! consent, strips non-essential cookies while consent is outstanding, and
//! keeps an audit log of every decision.
//!
//! ```no_run
//! # async fn demo() -> Result<(), cookie_consent::error::AppError> {
//! use cookie_consent::{config, http::{ConsentState, attach}};
//!
//! let config = config::load(None)?;
//! let state = ConsentState::in_memory(config.consent)?;
//! let app = attach(axum::Router::new(), state);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

mod core;

pub mod bootstrap;
pub mod consent;
pub mod geo;
pub mod http;
pub mod i18n;
pub mod integrations;

pub use core::{config, error};
