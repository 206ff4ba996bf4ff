//! Error types for the Dify agent SDK

use crate::types::DifyMode;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Non-success HTTP status from the Dify API, with the error body
    /// captured for diagnostics
    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The configured response mode has no response processor
    #[error("{0:?} mode is not supported for now")]
    UnsupportedMode(DifyMode),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error from a status and captured error body
    pub fn api(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Error::Api {
            status,
            body: body.into(),
        }
    }
}
