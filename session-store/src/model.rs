//! Data model for runs and their per-task records.
//!
//! These types are the persisted shape (serde JSON) and the dashboard API
//! shape at the same time; keep field names stable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of repository event started the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    PushWithoutPr,
    PushWithPr,
    PrOpened,
    PrSynchronized,
    PrReopened,
}

/// How the trigger filter classified the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    FullAutomation,
    LightweightOnly,
    Partial,
    SkippedTrivialChange,
    SkippedDocsOnly,
    SkippedByTriggerMode,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    CompletedWithIssues,
    Failed,
    Skipped,
}

impl RunStatus {
    /// Terminal statuses reject further writes.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::CompletedWithIssues
                | RunStatus::Failed
                | RunStatus::Skipped
        )
    }
}

/// The four automation tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    CodeReview,
    ReadmeUpdate,
    SpecUpdate,
    ReviewLog,
}

impl TaskName {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::CodeReview => "code_review",
            TaskName::ReadmeUpdate => "readme_update",
            TaskName::SpecUpdate => "spec_update",
            TaskName::ReviewLog => "review_log",
        }
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a single task inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// Classified cause of a task failure, surfaced on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    HostApiError,
    HostAuthError,
    HostNotFound,
    HostRateLimited,
    LlmError,
    ProviderError,
    PostSideEffectFailed,
    Cancelled,
    Interrupted,
    Unknown,
}

/// Size/composition snapshot of the diff that triggered the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub files_changed: usize,
    pub docs_only: bool,
}

/// Token/cost accounting for one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated_cost_usd: f64,
}

/// Aggregated accounting for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated_cost_usd: f64,
    pub wall_ms: u64,
}

/// Error details kept per failed task on the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: TaskErrorKind,
    pub message: String,
}

/// Record of one task inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: TaskName,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<TaskErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metrics: TaskMetrics,
}

impl TaskRecord {
    pub fn pending(name: TaskName) -> Self {
        Self {
            name,
            status: TaskStatus::Pending,
            started_at: None,
            finished_at: None,
            summary: None,
            error_kind: None,
            error_message: None,
            metrics: TaskMetrics::default(),
        }
    }
}

/// Top-level record for one orchestrated automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub commit_sha: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<TriggerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_type: Option<RunType>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<DiffSummary>,
    #[serde(default)]
    pub tasks: BTreeMap<TaskName, TaskRecord>,
    #[serde(default)]
    pub metrics: RunMetrics,
    /// Failed task names in the order the failures were recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_tasks: Vec<TaskName>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_errors: BTreeMap<TaskName, TaskFailure>,
    /// Failure not attributable to a single task (diff fetch, grouped-PR
    /// composition). Kept so no fault vanishes from the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_error: Option<TaskFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_pr: Option<u64>,
    /// `"<commit_sha>:<event_action>"`, used for webhook re-delivery dedup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

/// Fields the ingress knows at accept time.
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub commit_sha: String,
    pub branch: String,
    pub pr_number: Option<u64>,
    pub dedup_key: Option<String>,
}

/// Compact projection served by the history endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: String,
    pub commit_sha: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<TriggerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_type: Option<RunType>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub metrics: RunMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_tasks: Vec<TaskName>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_errors: BTreeMap<TaskName, TaskFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_pr: Option<u64>,
}

impl From<&Run> for RunSummary {
    fn from(r: &Run) -> Self {
        Self {
            id: r.id.clone(),
            commit_sha: r.commit_sha.clone(),
            branch: r.branch.clone(),
            pr_number: r.pr_number,
            trigger_type: r.trigger_type,
            run_type: r.run_type,
            status: r.status,
            started_at: r.started_at,
            finished_at: r.finished_at,
            skip_reason: r.skip_reason.clone(),
            metrics: r.metrics,
            failed_tasks: r.failed_tasks.clone(),
            task_errors: r.task_errors.clone(),
            automation_pr: r.automation_pr,
        }
    }
}

/// Stable run id: short commit prefix + millisecond timestamp.
///
/// Unique within a store as long as the same commit is not accepted twice
/// in the same millisecond, which the dedup window already prevents.
pub fn make_run_id(commit_sha: &str, at: DateTime<Utc>) -> String {
    let prefix: String = commit_sha.chars().take(8).collect();
    format!("{}-{}", prefix, at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_has_short_prefix_and_millis() {
        let at = DateTime::parse_from_rfc3339("2025-06-01T12:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = make_run_id("abcdef1234567890", at);
        assert!(id.starts_with("abcdef12-"));
        assert!(id.ends_with(&at.timestamp_millis().to_string()));
    }

    #[test]
    fn task_names_serialize_snake_case_as_map_keys() {
        let mut tasks = BTreeMap::new();
        tasks.insert(TaskName::CodeReview, TaskRecord::pending(TaskName::CodeReview));
        let json = serde_json::to_string(&tasks).unwrap();
        assert!(json.contains("\"code_review\""));
    }
}
