//! Logging initialisation via tracing-subscriber.
//!
//! Consent decisions log at `info`, per-request context at `trace`.
//! HTTP client and server internals are held at `warn` unless the whole
//! process runs at `trace`.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Directives appended to every filter below `trace`.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Build the filter for `level`.
///
/// `level` is a level name (`"error"` … `"trace"`) or a full `EnvFilter`
/// directive such as `"info,cookie_consent::http=debug"`. With
/// `prefer_level` it wins over `RUST_LOG`; otherwise `RUST_LOG` wins and
/// `level` is the fallback.
pub fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    let mut filter = if prefer_level {
        match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })?,
        }
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?
    };

    if !parse_level(level).is_ok_and(|l| l == LevelFilter::TRACE) {
        for directive in QUIET_DEPENDENCIES {
            let directive = directive
                .parse()
                .map_err(|e| AppError::Logger(format!("bad directive '{directive}': {e}")))?;
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

/// Install the global subscriber, writing to stderr. Call once at startup.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level, prefer_level)?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Parse a plain level name into a [`LevelFilter`].
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}
