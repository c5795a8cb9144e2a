//! POST /webhook
//!
//! Verifies the HMAC signature over the raw body, normalizes the event,
//! and hands it to the orchestrator. The handler answers 202 immediately;
//! orchestration continues detached, so downstream faults can never turn
//! into a 5xx here.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use automation::RepoEvent;

use crate::core::app_state::AppState;
use crate::routes::webhook::event_payload::{PullRequestEventPayload, PushEventPayload};
use crate::routes::webhook::signature::verify_signature;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";

/// Body of the 202 acknowledgement.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub run_id: String,
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // 1) Authenticate the payload before looking at anything else.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(&state.config.webhook_secret, &body, signature) {
        warn!("webhook rejected: signature mismatch");
        return (StatusCode::FORBIDDEN, "signature mismatch").into_response();
    }

    // 2) Normalize by event kind; unknown kinds are acknowledged and dropped.
    let event_kind = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let event: RepoEvent = match event_kind {
        "push" => match serde_json::from_slice::<PushEventPayload>(&body) {
            Ok(p) => match p.into_event() {
                Ok(ev) => ev,
                Err(reason) => {
                    debug!(?reason, "push event not actionable");
                    return StatusCode::NO_CONTENT.into_response();
                }
            },
            Err(e) => {
                warn!(error = %e, "malformed push payload");
                return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
            }
        },
        "pull_request" => match serde_json::from_slice::<PullRequestEventPayload>(&body) {
            Ok(p) => p.into_event(),
            Err(e) => {
                warn!(error = %e, "malformed pull_request payload");
                return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
            }
        },
        other => {
            debug!(kind = other, "ignoring unknown event kind");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    // 3) Accept: dedup + pending record; execution continues detached.
    match state.orchestrator.clone().accept(event).await {
        Ok(accepted) => {
            info!(
                run_id = %accepted.run_id,
                deduplicated = accepted.deduplicated,
                "webhook accepted"
            );
            (
                StatusCode::ACCEPTED,
                Json(AcceptedResponse {
                    status: "accepted",
                    run_id: accepted.run_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            // Local store fault; not a downstream error.
            warn!(error = %e, "failed to accept webhook");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to record run").into_response()
        }
    }
}
