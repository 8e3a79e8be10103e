//! Error types for GasWatch

use thiserror::Error;

/// Result type alias using GasWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for GasWatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Store constraint violated outside of the database (in-memory store)
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("{0}")]
    Validation(String),

    /// An external service (gas oracle, Telegram) could not be reached or
    /// returned garbage
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The notification sink rejected a message
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the error was caused by bad caller input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
