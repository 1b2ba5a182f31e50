//! Bootstrap layer; runs before the server starts.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
