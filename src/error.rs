// src/error.rs

//! Unified error handling for the results cache.
//!
//! Only non-retryable local failures are represented here. Upstream trouble
//! (timeouts, 5xx, 429, malformed payloads) is absorbed by the fetcher and
//! surfaces as "unavailable", never as an `AppError`.

use std::fmt;

use thiserror::Error;

/// Result type alias for podium operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable or hot store failure
    #[error("Storage error for {context}: {message}")]
    Storage { context: String, message: String },

    /// Requested season is outside the served range
    #[error("Invalid season {season}: must be between {min} and {max}")]
    InvalidSeason { season: i32, min: i32, max: i32 },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error with context.
    pub fn storage(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
