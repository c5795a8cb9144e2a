//! Review-log worker: condenses a completed review into a running log.
//!
//! Appends to `CODE_REVIEW.md`, creating the file with a header when
//! absent. Only runs after a successful code review - the orchestrator
//! passes the review body in.

use chrono::Utc;
use session_store::{TaskMetrics, TaskName};
use tracing::debug;

use llm_gateway::gateway::GenerateRequest;

use crate::errors::{classify_gateway_error, classify_host_error};
use crate::trigger::TriggerContext;
use crate::workers::{ProposedFile, TaskOutcome, WorkerDeps, strip_outer_fence};

const LOG_PATH: &str = "CODE_REVIEW.md";

const FILE_HEADER: &str = "# Code Review Log\n\nRunning log of automated review summaries.\n";

const SYSTEM_PROMPT: &str = r#"You condense code reviews for a running log.
Produce a short multi-line entry with:
- Score: n/10
- Key issues: one line each, most severe first (or "none")
- Action items: one line each (or "none")
Nothing else."#;

fn build_prompt(review_markdown: &str) -> String {
    format!(
        "# Full Review\n{review_markdown}\n\
         \n# Task\nCondense the review into the log entry format."
    )
}

/// Appends a dated entry; the input document is created from the header
/// when empty.
fn apply_entry(current: &str, entry: &str, ctx: &TriggerContext, timestamp: &str) -> String {
    let mut doc = if current.trim().is_empty() {
        FILE_HEADER.to_string()
    } else {
        current.to_string()
    };
    if !doc.ends_with('\n') {
        doc.push('\n');
    }

    let short: String = ctx.event.commit_sha.chars().take(8).collect();
    let source = match ctx.event.pr_number {
        Some(n) => format!("commit {short} (PR #{n})"),
        None => format!("commit {short}"),
    };
    doc.push_str(&format!(
        "\n## {timestamp} — {source}\n\n{}\n",
        entry.trim_end()
    ));
    doc
}

pub(crate) async fn run(
    deps: &WorkerDeps,
    ctx: &TriggerContext,
    review_markdown: &str,
) -> TaskOutcome {
    let current = match deps.host.get_file(LOG_PATH, &ctx.event.commit_sha).await {
        Ok(Some(file)) => file.content,
        Ok(None) => String::new(),
        Err(e) => {
            return TaskOutcome::failed(
                TaskName::ReviewLog,
                classify_host_error(&e),
                format!("failed to read {LOG_PATH}: {e}"),
            );
        }
    };

    let prompt = build_prompt(review_markdown);
    debug!(commit = %ctx.event.commit_sha, "review log: condensing");

    let completion = match deps
        .gateway
        .generate(GenerateRequest {
            prompt: &prompt,
            system: Some(SYSTEM_PROMPT),
        })
        .await
    {
        Ok(c) => c,
        Err(e) => {
            return TaskOutcome::failed(
                TaskName::ReviewLog,
                classify_gateway_error(&e),
                e.to_string(),
            );
        }
    };
    let metrics = TaskMetrics {
        prompt_tokens: completion.usage.prompt_tokens,
        completion_tokens: completion.usage.completion_tokens,
        estimated_cost_usd: completion.estimated_cost_usd,
    };

    let timestamp = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    let updated = apply_entry(
        &current,
        strip_outer_fence(&completion.text),
        ctx,
        &timestamp,
    );

    let mut out = TaskOutcome::success(TaskName::ReviewLog, "appended review log entry")
        .with_metrics(metrics);
    out.proposed = Some(ProposedFile {
        path: LOG_PATH.to_string(),
        content: updated,
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{EventKind, PrAction, RepoEvent, analyze_diff};
    use session_store::{RunType, TriggerType};

    fn ctx(pr: Option<u64>) -> TriggerContext {
        TriggerContext {
            event: RepoEvent {
                kind: EventKind::PullRequest,
                action: Some(PrAction::Synchronize),
                commit_sha: "abcdef0123456789".into(),
                branch: "feature/x".into(),
                pr_number: pr,
            },
            trigger_type: TriggerType::PrSynchronized,
            run_type: RunType::FullAutomation,
            analysis: analyze_diff(""),
            diff_text: String::new(),
            pr: None,
            planned: Vec::new(),
        }
    }

    #[test]
    fn creates_file_with_header_when_absent() {
        let out = apply_entry("", "- Score: 8/10", &ctx(Some(67)), "2025-06-01 12:00 UTC");
        assert!(out.starts_with("# Code Review Log"));
        assert!(out.contains("## 2025-06-01 12:00 UTC — commit abcdef01 (PR #67)"));
        assert!(out.ends_with("- Score: 8/10\n"));
    }

    #[test]
    fn appends_to_existing_log_without_touching_prior_entries() {
        let existing = "# Code Review Log\n\n## old entry\n\n- Score: 5/10\n";
        let out = apply_entry(existing, "- Score: 9/10", &ctx(None), "2025-06-02 09:00 UTC");
        assert!(out.contains("## old entry"));
        assert!(out.contains("## 2025-06-02 09:00 UTC — commit abcdef01\n"));
        assert!(out.find("old entry").unwrap() < out.find("9/10").unwrap());
    }
}
