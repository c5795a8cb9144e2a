//! Code-review worker: diff → structured markdown review → delivery.
//!
//! Delivery policy:
//! - PR known and `post_review_on_pr` → PR review with event=COMMENT
//! - otherwise, `post_as_issue` → a new issue
//! - otherwise → a comment on the commit
//!
//! Generation succeeding but delivery failing is reported as
//! `post_side_effect_failed`; the generated text is still handed to the
//! review-log task through the outcome.

use session_store::{TaskErrorKind, TaskMetrics, TaskName};
use tracing::{debug, info};

use llm_gateway::gateway::GenerateRequest;

use crate::errors::classify_gateway_error;
use crate::trigger::TriggerContext;
use crate::workers::{TaskOutcome, WorkerDeps};

const SYSTEM_PROMPT: &str = r#"You are a senior code reviewer.
- Be concise and actionable. Avoid generic advice.
- Prefer specific suggestions and minimal diffs when proposing fixes.
- Respect the project's style; do not reformat unrelated code.
- If the change looks correct, acknowledge briefly and do not invent issues.
Structure the review exactly as:
## Strengths
## Issues
(each issue as `- file:line [severity] description`, severity one of low/medium/high)
## Suggestions
## Security
## Performance"#;

/// Assemble the review prompt from the trigger context plus any fetched
/// surrounding file context.
fn build_prompt(ctx: &TriggerContext, context_blocks: &[(String, String)]) -> String {
    let pr_line = match &ctx.pr {
        Some(pr) => format!("Pull request: #{} — {}\n", pr.number, pr.title),
        None => String::new(),
    };
    let mut context = String::new();
    if !context_blocks.is_empty() {
        context.push_str("\n# Surrounding File Context\n");
        for (path, slice) in context_blocks {
            context.push_str(&format!("`{path}`:\n```\n{slice}\n```\n"));
        }
    }
    format!(
        "# Change Under Review\n\
         Commit: {}\nBranch: {}\n{}\
         Files changed: {} ({} lines added, {} removed)\n\
         \n# Unified Diff\n```diff\n{}\n```\n{}\
         \n# Task\nReview the change above.",
        ctx.event.commit_sha,
        ctx.event.branch,
        pr_line,
        ctx.analysis.files_changed,
        ctx.analysis.lines_added,
        ctx.analysis.lines_removed,
        ctx.diff_text,
        context
    )
}

/// Best-effort fetch of the first changed files at the event's commit,
/// sliced to the configured line budget. Fetch faults drop the file from
/// context rather than failing the review.
async fn fetch_context(deps: &WorkerDeps, ctx: &TriggerContext) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    for path in crate::trigger::changed_paths(&ctx.diff_text)
        .into_iter()
        .take(deps.settings.review_context_files)
    {
        match deps.host.get_file(&path, &ctx.event.commit_sha).await {
            Ok(Some(file)) => {
                let slice: String = file
                    .content
                    .lines()
                    .take(deps.settings.review_context_lines)
                    .collect::<Vec<_>>()
                    .join("\n");
                blocks.push((path, slice));
            }
            Ok(None) => {}
            Err(e) => {
                debug!(%path, error = %e, "skipping context file");
            }
        }
    }
    blocks
}

pub(crate) async fn run(deps: &WorkerDeps, ctx: &TriggerContext) -> TaskOutcome {
    let context_blocks = fetch_context(deps, ctx).await;
    let prompt = build_prompt(ctx, &context_blocks);
    debug!(
        commit = %ctx.event.commit_sha,
        prompt_len = prompt.len(),
        "code review: generating"
    );

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
                TaskName::CodeReview,
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
    let review = completion.text;

    // Delivery per policy; the review text survives delivery failure.
    let delivery = deliver(deps, ctx, &review).await;
    match delivery {
        Ok(summary) => {
            info!(commit = %ctx.event.commit_sha, %summary, "code review delivered");
            let mut out = TaskOutcome::success(TaskName::CodeReview, summary).with_metrics(metrics);
            out.output_text = Some(review);
            out
        }
        Err((kind, message)) => {
            let mut out = TaskOutcome::failed(TaskName::CodeReview, kind, message)
                .with_metrics(metrics);
            out.output_text = Some(review);
            out
        }
    }
}

async fn deliver(
    deps: &WorkerDeps,
    ctx: &TriggerContext,
    review: &str,
) -> Result<String, (TaskErrorKind, String)> {
    // Posting failed after generation: classified as a side-effect failure,
    // with the host detail kept in the message.
    let post_failed = |e: host_client::HostError| {
        (
            TaskErrorKind::PostSideEffectFailed,
            format!("review generated but posting failed: {e}"),
        )
    };

    if deps.settings.post_review_on_pr {
        if let Some(pr) = &ctx.pr {
            deps.host
                .post_pr_review(pr.number, review)
                .await
                .map_err(post_failed)?;
            return Ok(format!("posted review on PR #{}", pr.number));
        }
    }

    if deps.settings.post_as_issue {
        let short: String = ctx.event.commit_sha.chars().take(8).collect();
        let number = deps
            .host
            .create_issue(
                &format!("Automated review for {short}"),
                review,
                &["automated-review".to_string()],
            )
            .await
            .map_err(post_failed)?;
        return Ok(format!("opened review issue #{number}"));
    }

    deps.host
        .post_commit_comment(&ctx.event.commit_sha, review)
        .await
        .map_err(post_failed)?;
    let short: String = ctx.event.commit_sha.chars().take(8).collect();
    Ok(format!("posted commit comment on {short}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{EventKind, PrAction, RepoEvent, analyze_diff};
    use host_client::PullRequestInfo;
    use session_store::{RunType, TriggerType};

    fn ctx() -> TriggerContext {
        let diff = "diff --git a/src/a.rs b/src/a.rs\n--- a/src/a.rs\n+++ b/src/a.rs\n+fn x() {}\n";
        TriggerContext {
            event: RepoEvent {
                kind: EventKind::PullRequest,
                action: Some(PrAction::Synchronize),
                commit_sha: "abcdef0123456789".into(),
                branch: "feature/x".into(),
                pr_number: Some(67),
            },
            trigger_type: TriggerType::PrSynchronized,
            run_type: RunType::FullAutomation,
            analysis: analyze_diff(diff),
            diff_text: diff.to_string(),
            pr: Some(PullRequestInfo {
                number: 67,
                title: "Add x".into(),
                state: "open".into(),
                head_branch: "feature/x".into(),
                head_sha: "abcdef0123456789".into(),
                base_branch: "main".into(),
                html_url: None,
            }),
            planned: Vec::new(),
        }
    }

    #[test]
    fn prompt_carries_diff_and_pr_context() {
        let p = build_prompt(&ctx(), &[]);
        assert!(p.contains("```diff"));
        assert!(p.contains("fn x() {}"));
        assert!(p.contains("Pull request: #67"));
        assert!(p.contains("abcdef0123456789"));
        assert!(!p.contains("Surrounding File Context"));
    }

    #[test]
    fn prompt_includes_fetched_file_context() {
        let blocks = vec![("src/a.rs".to_string(), "fn existing() {}".to_string())];
        let p = build_prompt(&ctx(), &blocks);
        assert!(p.contains("Surrounding File Context"));
        assert!(p.contains("`src/a.rs`"));
        assert!(p.contains("fn existing() {}"));
    }

    #[test]
    fn system_prompt_demands_the_structured_sections() {
        for section in ["Strengths", "Issues", "Suggestions", "Security", "Performance"] {
            assert!(SYSTEM_PROMPT.contains(section));
        }
    }
}
