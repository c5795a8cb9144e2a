//! Task workers without async-trait or dynamic trait objects.
//!
//! Each worker is a pair of capabilities over a tag:
//! - `plan(ctx)` - cheap pre-execution veto (e.g. no code review for
//!   doc-only diffs);
//! - `execute(deps, ctx)` - runs the task and returns a typed outcome.
//!
//! Dispatch is a `match` over [`TaskName`], keeping async fns simple and
//! avoiding boxed futures.

pub mod code_review;
pub mod readme_update;
pub mod review_log;
pub mod spec_update;

use std::sync::Arc;

use host_client::HostClient;
use llm_gateway::LlmGateway;
use session_store::{RunType, TaskErrorKind, TaskMetrics, TaskName};

use crate::settings::AutomationSettings;
use crate::trigger::TriggerContext;

/// Shared collaborators handed to every worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub host: Arc<HostClient>,
    pub gateway: Arc<LlmGateway>,
    pub settings: Arc<AutomationSettings>,
}

/// A file blob a worker proposes for the grouped automation PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedFile {
    pub path: String,
    pub content: String,
}

/// Terminal result of one worker execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    Success { summary: String },
    Skipped { reason: String },
    Failed { kind: TaskErrorKind, message: String },
}

impl OutcomeKind {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::Success { .. } => "success",
            OutcomeKind::Skipped { .. } => "skipped",
            OutcomeKind::Failed { .. } => "failed",
        }
    }
}

/// What a worker reports back to the orchestrator.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub name: TaskName,
    pub outcome: OutcomeKind,
    pub metrics: TaskMetrics,
    /// Content for the grouped PR, when the task produces a doc blob.
    pub proposed: Option<ProposedFile>,
    /// Raw generated text for downstream tasks (review → review log).
    pub output_text: Option<String>,
}

impl TaskOutcome {
    pub fn success(name: TaskName, summary: impl Into<String>) -> Self {
        Self {
            name,
            outcome: OutcomeKind::Success {
                summary: summary.into(),
            },
            metrics: TaskMetrics::default(),
            proposed: None,
            output_text: None,
        }
    }

    pub fn skipped(name: TaskName, reason: impl Into<String>) -> Self {
        Self {
            name,
            outcome: OutcomeKind::Skipped {
                reason: reason.into(),
            },
            metrics: TaskMetrics::default(),
            proposed: None,
            output_text: None,
        }
    }

    pub fn failed(name: TaskName, kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            name,
            outcome: OutcomeKind::Failed {
                kind,
                message: message.into(),
            },
            metrics: TaskMetrics::default(),
            proposed: None,
            output_text: None,
        }
    }

    pub fn with_metrics(mut self, metrics: TaskMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, OutcomeKind::Success { .. })
    }
}

/// Pre-execution veto. Pure; the orchestrator calls this while selecting
/// the worker set.
pub fn plan(name: TaskName, ctx: &TriggerContext) -> bool {
    match name {
        // Review only code; lightweight runs never review.
        TaskName::CodeReview => {
            ctx.analysis.code_lines > 0 && ctx.run_type != RunType::LightweightOnly
        }
        TaskName::ReadmeUpdate | TaskName::SpecUpdate => true,
        // Depends on a successful review; the orchestrator gates it again
        // at runtime.
        TaskName::ReviewLog => true,
    }
}

/// Executes one independent worker (review-log is driven separately since
/// it consumes the review output).
pub async fn execute(name: TaskName, deps: &WorkerDeps, ctx: &TriggerContext) -> TaskOutcome {
    match name {
        TaskName::CodeReview => code_review::run(deps, ctx).await,
        TaskName::ReadmeUpdate => readme_update::run(deps, ctx).await,
        TaskName::SpecUpdate => spec_update::run(deps, ctx).await,
        TaskName::ReviewLog => TaskOutcome::failed(
            TaskName::ReviewLog,
            TaskErrorKind::Unknown,
            "review_log requires the review output; dispatched via execute_review_log",
        ),
    }
}

/// Executes the review-log worker against a successful review body.
pub async fn execute_review_log(
    deps: &WorkerDeps,
    ctx: &TriggerContext,
    review_markdown: &str,
) -> TaskOutcome {
    review_log::run(deps, ctx, review_markdown).await
}

/// Shared helper: models happily wrap whole files in a markdown fence;
/// unwrap one if it spans the entire output.
pub(crate) fn strip_outer_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string of the opening fence.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim_end_matches('`').trim_matches('\n'),
        None => trimmed,
    }
}
