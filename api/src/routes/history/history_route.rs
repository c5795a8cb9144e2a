//! Dashboard read API: run history.
//!
//! - GET /api/history?limit=&since=   - newest first
//! - GET /api/history/pr/{pr_number}  - runs for one source PR
//! - GET /api/history/skipped         - skipped runs only

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use session_store::RunSummary;

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    /// RFC3339 lower bound on the run start time.
    pub since: Option<String>,
}

pub async fn history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> AppResult<Json<Vec<RunSummary>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let since = match &q.since {
        None => None,
        Some(raw) => Some(
            raw.parse::<DateTime<Utc>>()
                .map_err(|e| AppError::BadRequest(format!("invalid since timestamp: {e}")))?,
        ),
    };
    Ok(Json(state.store.list_runs(limit, since).await))
}

pub async fn history_by_pr(
    State(state): State<AppState>,
    Path(pr_number): Path<u64>,
) -> Json<Vec<RunSummary>> {
    Json(state.store.list_by_pr(pr_number).await)
}

pub async fn history_skipped(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    Json(state.store.list_skipped().await)
}
