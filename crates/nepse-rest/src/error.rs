//! Error types for REST API operations

use nepse_auth::AuthError;

/// Errors that can occur during REST API operations
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// HTTP request failed (transport or non-2xx status)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication core failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Failed to parse a response body
    #[error("Parse error: {0}")]
    Parse(String),

    /// Symbol not present in the security listing
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl RestError {
    /// Whether the error came from the authentication core rather than the
    /// data endpoint itself
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
