//! Crate-wide error hierarchy for the automation pipeline.
//!
//! Worker faults are classified into [`TaskErrorKind`] before they reach
//! the session store, so every failure the dashboard shows carries a
//! stable machine-readable kind next to its message.

use session_store::{StoreError, TaskErrorKind};
use thiserror::Error;

use host_client::{HostError, HostErrorKind};
use llm_gateway::GatewayError;

/// Convenient alias for pipeline results.
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Root error type for the automation crate.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Repository host failure.
    #[error(transparent)]
    Host(#[from] HostError),

    /// LLM gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Session store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Input validation errors (bad event payloads, unusable shas).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Classifies a host failure for the dashboard.
pub fn classify_host_error(e: &HostError) -> TaskErrorKind {
    match e.kind() {
        HostErrorKind::Auth => TaskErrorKind::HostAuthError,
        HostErrorKind::NotFound => TaskErrorKind::HostNotFound,
        HostErrorKind::RateLimited => TaskErrorKind::HostRateLimited,
        HostErrorKind::Conflict | HostErrorKind::Transient | HostErrorKind::Other => {
            TaskErrorKind::HostApiError
        }
    }
}

/// Classifies a gateway failure for the dashboard.
pub fn classify_gateway_error(e: &GatewayError) -> TaskErrorKind {
    if e.is_provider_config() {
        TaskErrorKind::ProviderError
    } else {
        TaskErrorKind::LlmError
    }
}

/// Classifies any pipeline error for the dashboard.
pub fn classify_error(e: &AutomationError) -> TaskErrorKind {
    match e {
        AutomationError::Host(h) => classify_host_error(h),
        AutomationError::Gateway(g) => classify_gateway_error(g),
        AutomationError::Store(_) => TaskErrorKind::Unknown,
        AutomationError::Validation(_) => TaskErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_errors_map_to_dashboard_kinds() {
        assert_eq!(
            classify_host_error(&HostError::Auth),
            TaskErrorKind::HostAuthError
        );
        assert_eq!(
            classify_host_error(&HostError::NotFound),
            TaskErrorKind::HostNotFound
        );
        assert_eq!(
            classify_host_error(&HostError::RateLimited {
                retry_after_secs: None
            }),
            TaskErrorKind::HostRateLimited
        );
        assert_eq!(
            classify_host_error(&HostError::Server(502)),
            TaskErrorKind::HostApiError
        );
    }
}
