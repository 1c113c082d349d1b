use thiserror::Error;

use crate::util::UrlValidationError;

/// Errors from talking to the backend.
///
/// Transport failures (network, timeout, non-2xx) and malformed payloads are
/// both retry-able from the user's point of view; the distinction is kept
/// for logging.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Valid JSON, but not the shape the endpoint answers with.
    #[error("Unexpected response from {0}: no item list")]
    UnexpectedShape(String),
    #[error("Invalid API base URL: {0}")]
    BaseUrl(#[from] UrlValidationError),
    #[error("Guest users cannot {0}")]
    Guest(&'static str),
}

impl ApiError {
    /// True for transport-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout(_) | ApiError::Network(_) | ApiError::HttpStatus(_)
        )
    }

    /// True when the transport succeeded but the body was unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ApiError::Malformed(_)
                | ApiError::UnexpectedShape(_)
                | ApiError::InvalidUtf8
                | ApiError::ResponseTooLarge(_)
        )
    }

    /// Whether showing a retry affordance makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::HttpStatus(status) => *status >= 500 || *status == 429 || *status == 408,
            ApiError::Timeout(_) | ApiError::Network(_) => true,
            other => other.is_malformed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        assert!(ApiError::Timeout(15).is_transport());
        assert!(ApiError::HttpStatus(502).is_retryable());
        assert!(!ApiError::HttpStatus(404).is_retryable());
        assert!(ApiError::InvalidUtf8.is_malformed());
        assert!(ApiError::InvalidUtf8.is_retryable());
        let shape = ApiError::UnexpectedShape("api/proxy/foryou".into());
        assert!(shape.is_malformed());
        assert!(shape.is_retryable());
        assert!(!shape.is_transport());
        assert!(!ApiError::Guest("save favorites").is_retryable());
    }

    #[test]
    fn test_malformed_from_serde() {
        let err: ApiError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(err.is_malformed());
        assert!(err.to_string().starts_with("Malformed JSON"));
    }
}
