use std::sync::Arc;
use std::time::Instant;

use automation::Orchestrator;
use session_store::SessionStore;

use crate::core::config::AppConfig;

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SessionStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// Process start, for the liveness endpoint's uptime.
    pub started_at: Instant,
}
