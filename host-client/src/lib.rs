//! Typed wrapper over the repository host's REST surface.
//!
//! One repository per process instance; the client is stateless beyond its
//! auth and may be shared freely. Every call returns a typed
//! [`HostError`] on failure; transient faults and 429s are retried with
//! exponential backoff and jitter up to a bounded cap, everything else
//! propagates immediately.
//!
//! Bodies are never logged - only method, path, and status.

pub mod client;
pub mod errors;
pub mod retry;
pub mod types;

pub use client::{HostClient, HostClientConfig};
pub use errors::{HostError, HostErrorKind, HostResult};
pub use types::*;
