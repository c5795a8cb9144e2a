//! GET /api/trigger-config - read-only view of the trigger settings.

use axum::{Json, extract::State};
use serde::Serialize;

use automation::TriggerMode;

use crate::core::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerConfigView {
    pub trigger_mode: TriggerMode,
    pub trivial_change_filter_enabled: bool,
    pub trivial_max_lines: usize,
    pub docs_only_lightweight: bool,
    pub post_review_on_pr: bool,
    pub post_as_issue: bool,
    pub group_automation_updates: bool,
}

pub async fn trigger_config(State(state): State<AppState>) -> Json<TriggerConfigView> {
    let s = state.orchestrator.settings();
    Json(TriggerConfigView {
        trigger_mode: s.trigger_mode,
        trivial_change_filter_enabled: s.trivial_filter_enabled,
        trivial_max_lines: s.trivial_max_lines,
        docs_only_lightweight: s.docs_only_lightweight,
        post_review_on_pr: s.post_review_on_pr,
        post_as_issue: s.post_as_issue,
        group_automation_updates: s.group_automation_updates,
    })
}
