//! Error hierarchy for the session store.

use thiserror::Error;

/// Convenient alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Root error type for the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Persisted document carries a schema this build does not understand.
    #[error("unsupported schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("task {task} not found on run {run_id}")]
    TaskNotFound { run_id: String, task: String },

    /// Write attempted against a run already in a terminal status.
    #[error("run {0} is terminal and cannot be modified")]
    TerminalRun(String),

    /// A status change that violates the run/task state machine.
    #[error("invalid transition for {subject}: {from} -> {to}")]
    InvalidTransition {
        subject: String,
        from: String,
        to: String,
    },
}
