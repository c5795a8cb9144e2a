//! GET /api/metrics - aggregate counters for the dashboard.

use axum::{Json, extract::State};
use session_store::StoreMetrics;

use crate::core::app_state::AppState;

pub async fn metrics(State(state): State<AppState>) -> Json<StoreMetrics> {
    Json(state.store.aggregate_metrics().await)
}
