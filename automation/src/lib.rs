//! Automation pipeline: event → classification → tasks → grouped PR.
//!
//! Single high-level entry per repository event:
//!
//! 1) **Accept** - dedup against recent runs, create the pending record,
//!    return the run id immediately (the ingress answers 202 with it).
//! 2) **Classify** - fetch the diff, analyze it, and decide the run type;
//!    trivial/doc-only/mode-excluded events end here as skipped runs.
//! 3) **Execute** - fan the planned workers out concurrently under per-task
//!    deadlines; every outcome lands in the session store; a worker failure
//!    never cancels its peers.
//! 4) **Compose** - collect proposed doc blobs into the per-PR automation
//!    branch and open-or-update the grouped pull request.
//! 5) **Finalize** - terminal run status derived from task outcomes.
//!
//! The pipeline uses `tracing` for stage logging and avoids `async-trait`
//! and heap trait objects; workers are dispatched over an enum.

pub mod composer;
pub mod errors;
pub mod orchestrator;
pub mod settings;
pub mod trigger;
pub mod workers;

pub use errors::{AutomationError, AutomationResult};
pub use orchestrator::{AcceptedRun, Orchestrator};
pub use settings::{AutomationSettings, TriggerMode};
pub use trigger::{EventKind, PrAction, RepoEvent, TriggerContext};
