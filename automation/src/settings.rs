//! Behavior knobs for the pipeline, resolved once at startup.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Which event kinds are allowed to trigger work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Pr,
    Push,
    Both,
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pr" => Ok(TriggerMode::Pr),
            "push" => Ok(TriggerMode::Push),
            "both" => Ok(TriggerMode::Both),
            other => Err(format!("unknown trigger mode: {other:?}")),
        }
    }
}

/// Pipeline settings; built by the configuration layer and shared read-only.
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    pub trigger_mode: TriggerMode,
    /// Enables the trivial-change skip.
    pub trivial_filter_enabled: bool,
    /// Line threshold for the doc-only trivial rule.
    pub trivial_max_lines: usize,
    /// Doc-only diffs run the doc tasks instead of skipping entirely.
    pub docs_only_lightweight: bool,
    /// Deliver code reviews as PR reviews rather than commit comments.
    pub post_review_on_pr: bool,
    /// Fall back to opening an issue when no PR/commit delivery applies.
    pub post_as_issue: bool,
    /// Compose the grouped automation PR from proposed doc blobs.
    pub group_automation_updates: bool,
    /// Cap on diff text carried in a trigger context.
    pub diff_max_bytes: usize,
    /// How many changed files to pull into the review prompt as context.
    pub review_context_files: usize,
    /// Line cap per context file in the review prompt.
    pub review_context_lines: usize,
    /// Per-task execution deadline.
    pub task_timeout: Duration,
    /// Window inside which re-delivered events are deduplicated.
    pub dedup_window: Duration,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            trigger_mode: TriggerMode::Both,
            trivial_filter_enabled: true,
            trivial_max_lines: 10,
            docs_only_lightweight: false,
            post_review_on_pr: true,
            post_as_issue: false,
            group_automation_updates: true,
            diff_max_bytes: 120_000,
            review_context_files: 2,
            review_context_lines: 120,
            task_timeout: Duration::from_secs(600),
            dedup_window: Duration::from_secs(600),
        }
    }
}
