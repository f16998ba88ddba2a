//! Error types for Azure API interaction
//!
//! Every failure in the retrieval pipeline is fatal to the current call and
//! bubbles up to the binary, which reports it and exits non-zero.

use thiserror::Error;

/// Errors produced while resolving credentials, building queries or calling
/// the management APIs.
#[derive(Error, Debug)]
pub enum CarbonError {
    /// No identity strategy produced a token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A `--filter` expression could not be parsed.
    #[error("Invalid filter expression: {0}")]
    FilterFormat(String),

    /// Non-success response after any transient-failure retries.
    #[error("API request failed: {status}")]
    Http { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected API response: {0}")]
    Api(String),

    /// Invalid configuration, such as an unparseable API base address.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CarbonError {
    /// HTTP status code, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            CarbonError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CarbonError>;
