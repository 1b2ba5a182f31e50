//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("audit log error: {0}")]
    Audit(String),

    #[error("geo lookup error: {0}")]
    Geo(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
