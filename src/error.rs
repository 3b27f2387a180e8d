// src/error.rs

//! Unified error handling for the relay application.
//!
//! Two families live here:
//! - [`AppError`] for everything outside an adapter boundary (config, I/O,
//!   channel sends).
//! - [`FetchError`] for the reasons a source adapter came back empty. These
//!   never escape an adapter; they are carried inside a `FetchOutcome`.

use std::fmt;

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sending a message to a destination failed
    #[error("Dispatch error for {destination}: {message}")]
    Dispatch {
        destination: String,
        message: String,
    },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a dispatch error for a destination.
    pub fn dispatch(destination: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Dispatch {
            destination: destination.into(),
            message: message.to_string(),
        }
    }
}

/// Why a source adapter produced no offers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, timeout or body read failure
    #[error("network failure: {0}")]
    Network(String),

    /// Non-2xx HTTP status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Response matched an anti-bot or captcha signature
    #[error("blocked response (matched '{0}')")]
    Blocked(String),

    /// The API answered with an error payload
    #[error("rejected by source: {0}")]
    Rejected(String),

    /// Response could not be mapped to the expected shape
    #[error("unexpected schema: {0}")]
    UnexpectedSchema(String),

    /// A required credential or setting is absent
    #[error("missing configuration: {0}")]
    ConfigMissing(&'static str),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Status(_) | Self::Rejected(_)
        )
    }

    /// Short label used in log lines and cycle statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status(_) => "status",
            Self::Blocked(_) => "blocked",
            Self::Rejected(_) => "rejected",
            Self::UnexpectedSchema(_) => "schema",
            Self::ConfigMissing(_) => "config_missing",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Status(status.as_u16()),
            None if error.is_decode() => Self::UnexpectedSchema(error.to_string()),
            None => Self::Network(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        Self::UnexpectedSchema(error.to_string())
    }
}
