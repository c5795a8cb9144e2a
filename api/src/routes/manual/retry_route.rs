//! POST /api/runs/{run_id}/retry
//!
//! Re-executes a terminal run by synthesizing a fresh push-style trigger
//! from its stored commit id. The retry is a brand-new run linked to the
//! original through the shared commit sha; the original record is never
//! mutated.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use automation::{EventKind, RepoEvent};

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::webhook::webhook_route::AcceptedResponse;

pub async fn retry_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> AppResult<(StatusCode, Json<AcceptedResponse>)> {
    let run = state
        .store
        .get_run(&run_id)
        .await
        .ok_or(AppError::NotFound)?;
    if !run.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "run {run_id} is still {:?}",
            run.status
        )));
    }

    let event = RepoEvent {
        kind: EventKind::Push,
        action: None,
        commit_sha: run.commit_sha,
        branch: run.branch,
        pr_number: run.pr_number,
    };
    let accepted = state.orchestrator.clone().accept(event).await?;
    info!(
        original = %run_id,
        run_id = %accepted.run_id,
        "retry accepted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            run_id: accepted.run_id,
        }),
    ))
}
