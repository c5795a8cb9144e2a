//! Durable session memory for automation runs.
//!
//! One JSON document on disk is the authoritative record of every run the
//! service has ever performed, including skipped and failed ones. The store
//! is single-node by design:
//!
//! - mutations take a process-wide lock for a short, I/O-free critical
//!   section, then flush outside the lock;
//! - flushes happen after a bounded number of buffered mutations or a
//!   bounded interval, whichever comes first; terminal transitions always
//!   flush;
//! - writes are atomic (temp file + rename + fsync);
//! - on startup the store rehydrates and sweeps runs that were in flight
//!   when the previous process died, marking them `failed`/`interrupted`.

pub mod errors;
pub mod model;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use model::{
    DiffSummary, PendingRun, Run, RunMetrics, RunStatus, RunSummary, RunType, TaskErrorKind,
    TaskFailure, TaskMetrics, TaskName, TaskRecord, TaskStatus, TriggerType, make_run_id,
};
pub use store::{SessionStore, StoreConfig, StoreMetrics};
