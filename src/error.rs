//! Custom error types for rustpwc.
//!
//! This module defines all error types used throughout the library.
//! All functions return `Result<T, PwcError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustpwc operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum PwcError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Retrieved paper count disagrees with the count reported by the server
    #[error("Consistency error: server reported {reported} papers, retrieved {retrieved}")]
    Consistency {
        /// Total from the last listing response
        reported: u64,
        /// Papers actually concatenated across pages
        retrieved: usize,
    },

    /// Repository lookup failed for one paper
    #[error("Lookup failed for paper #{index}: {source}")]
    LookupFailed {
        /// Dataset index of the paper
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<PwcError>,
    },
}

/// Result type alias using `PwcError`
pub type Result<T> = std::result::Result<T, PwcError>;
