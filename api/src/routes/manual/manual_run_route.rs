//! POST /api/manual-run
//!
//! Synthesizes a push-style trigger from an operator request. When only a
//! branch is given, its head commit is resolved via the host first - the
//! one place a trigger endpoint awaits the host synchronously.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::info;

use automation::{EventKind, RepoEvent};

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::webhook::webhook_route::AcceptedResponse;

const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Deserialize)]
pub struct ManualRunRequest {
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
}

pub async fn manual_run(
    State(state): State<AppState>,
    Json(req): Json<ManualRunRequest>,
) -> AppResult<(StatusCode, Json<AcceptedResponse>)> {
    let branch = req
        .branch
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    let commit_sha = match req.commit_sha.filter(|s| !s.trim().is_empty()) {
        Some(sha) => sha,
        None => state
            .orchestrator
            .host()
            .get_branch_sha(&branch)
            .await
            .map_err(|e| AppError::Upstream(format!("could not resolve branch head: {e}")))?
            .ok_or_else(|| AppError::BadRequest(format!("branch {branch:?} not found")))?,
    };

    let event = RepoEvent {
        kind: EventKind::Push,
        action: None,
        commit_sha,
        branch,
        pr_number: None,
    };
    let accepted = state.orchestrator.clone().accept(event).await?;
    info!(run_id = %accepted.run_id, "manual run accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            run_id: accepted.run_id,
        }),
    ))
}
