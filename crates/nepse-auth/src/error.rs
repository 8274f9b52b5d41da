//! Error types for authentication operations

/// Errors that can occur while authenticating against the portal
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Authentication response is missing a field or carries a value that
    /// cannot be coerced. Fatal for that response; retrying with the same
    /// body cannot succeed.
    #[error("malformed auth response: field `{field}`: {reason}")]
    MalformedResponse {
        /// The offending response field
        field: &'static str,
        /// Why the field was rejected
        reason: String,
    },

    /// Transform module could not be loaded or lacks a required export.
    /// Raised at construction, never deferred to first use.
    #[error("transform module load failed: {0}")]
    TransformLoad(String),

    /// A transform function call failed at runtime
    #[error("transform call `{name}` failed: {reason}")]
    Transform {
        /// Export name that was invoked
        name: String,
        /// Failure detail from the runtime
        reason: String,
    },

    /// Transport or HTTP failure while fetching the scrambled token
    #[error("authentication request failed: {0}")]
    Authentication(#[source] reqwest::Error),

    /// Transport or HTTP failure while refreshing the token. The session
    /// keeps its previous credentials when this is returned.
    #[error("token refresh failed: {0}")]
    Refresh(#[source] reqwest::Error),

    /// Operation needs credentials the session does not hold yet
    #[error("not authenticated: {0}")]
    Unauthenticated(&'static str),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_response_names_field() {
        let err = AuthError::MalformedResponse {
            field: "salt3",
            reason: "not an integer".to_string(),
        };
        assert!(err.to_string().contains("salt3"));
    }

    #[test]
    fn test_unauthenticated_display() {
        let err = AuthError::Unauthenticated("payload id requires salts");
        assert!(err.to_string().contains("not authenticated"));
    }
}
