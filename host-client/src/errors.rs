//! Error hierarchy for the host client.
//!
//! Goals:
//! - Single error type for all public functions.
//! - Status-aware mapping (401/403→Auth, 404→NotFound, 429→RateLimited,
//!   409/422→Conflict, 5xx→Transient).
//! - No dynamic dispatch; ergonomic `?` via `From` impls.

use thiserror::Error;

/// Convenient alias for host-client results.
pub type HostResult<T> = Result<T, HostError>;

/// Coarse tag callers use to classify a failure without matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    Auth,
    NotFound,
    RateLimited,
    Conflict,
    Transient,
    Other,
}

/// Root error type for the host client.
#[derive(Debug, Error)]
pub enum HostError {
    /// Unauthorized or forbidden (HTTP 401/403).
    #[error("unauthorized")]
    Auth,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429); surfaced only after the retry cap.
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Conflicting write (HTTP 409, or 422 on create-existing).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Server error (HTTP 5xx); surfaced only after the retry cap.
    #[error("server error: status {0}")]
    Server(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Other HTTP status not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of host response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl HostError {
    pub fn kind(&self) -> HostErrorKind {
        match self {
            HostError::Auth => HostErrorKind::Auth,
            HostError::NotFound => HostErrorKind::NotFound,
            HostError::RateLimited { .. } => HostErrorKind::RateLimited,
            HostError::Conflict(_) => HostErrorKind::Conflict,
            HostError::Server(_) | HostError::Timeout | HostError::Network(_) => {
                HostErrorKind::Transient
            }
            HostError::HttpStatus(_) | HostError::Serde(_) | HostError::InvalidResponse(_) => {
                HostErrorKind::Other
            }
        }
    }

    /// Whether the retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            HostErrorKind::Transient | HostErrorKind::RateLimited
        )
    }

    /// Maps an HTTP status to the typed error. `body_hint` feeds conflict
    /// messages only; it is never logged wholesale.
    pub fn from_status(status: u16, retry_after_secs: Option<u64>, body_hint: &str) -> Self {
        match status {
            401 | 403 => HostError::Auth,
            404 => HostError::NotFound,
            409 | 422 => HostError::Conflict(short_hint(body_hint)),
            429 => HostError::RateLimited { retry_after_secs },
            500..=599 => HostError::Server(status),
            _ => HostError::HttpStatus(status),
        }
    }
}

fn short_hint(body: &str) -> String {
    let flat = body.replace(['\n', '\r'], " ");
    flat.chars().take(160).collect()
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return HostError::Timeout;
        }
        if let Some(status) = e.status() {
            return HostError::from_status(status.as_u16(), None, "");
        }
        HostError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_the_contract() {
        assert_eq!(HostError::from_status(401, None, "").kind(), HostErrorKind::Auth);
        assert_eq!(HostError::from_status(403, None, "").kind(), HostErrorKind::Auth);
        assert_eq!(HostError::from_status(404, None, "").kind(), HostErrorKind::NotFound);
        assert_eq!(HostError::from_status(409, None, "").kind(), HostErrorKind::Conflict);
        assert_eq!(HostError::from_status(422, None, "").kind(), HostErrorKind::Conflict);
        assert_eq!(
            HostError::from_status(429, Some(3), "").kind(),
            HostErrorKind::RateLimited
        );
        assert_eq!(HostError::from_status(502, None, "").kind(), HostErrorKind::Transient);
        assert_eq!(HostError::from_status(418, None, "").kind(), HostErrorKind::Other);
    }

    #[test]
    fn only_transient_and_rate_limited_are_retryable() {
        assert!(HostError::Server(503).is_retryable());
        assert!(HostError::Timeout.is_retryable());
        assert!(
            HostError::RateLimited {
                retry_after_secs: None
            }
            .is_retryable()
        );
        assert!(!HostError::Auth.is_retryable());
        assert!(!HostError::NotFound.is_retryable());
        assert!(!HostError::Conflict(String::new()).is_retryable());
    }
}
