//! Specification-log worker.
//!
//! Appends one entry to `spec.md` under the "Development Log" heading and
//! refreshes the `**Last Updated:**` stamp. The entry body comes from the
//! LLM; placement is deterministic post-processing - entries are appended,
//! never inserted mid-file.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use session_store::{TaskMetrics, TaskName};
use tracing::debug;

use llm_gateway::gateway::GenerateRequest;

use crate::errors::{classify_gateway_error, classify_host_error};
use crate::trigger::TriggerContext;
use crate::workers::{ProposedFile, TaskOutcome, WorkerDeps, strip_outer_fence};

const SPEC_PATH: &str = "spec.md";

const DEV_LOG_HEADING: &str = "## Development Log";

lazy_static! {
    static ref LAST_UPDATED: Regex =
        Regex::new(r"(?m)^\*\*Last Updated:\*\*.*$").expect("valid regex");
}

const SYSTEM_PROMPT: &str = r#"You keep a project's development log.
Given a change, write a short log entry with exactly three bulleted
sections titled Summary, Decisions, and Next Steps. No heading, no date —
those are added by the caller. Be specific and terse."#;

fn build_prompt(ctx: &TriggerContext) -> String {
    format!(
        "# Change (unified diff)\n```diff\n{}\n```\n\
         Commit: {} on branch {}\n\
         \n# Task\nWrite the log entry body.",
        ctx.diff_text, ctx.event.commit_sha, ctx.event.branch
    )
}

/// Fresh document used when the repository has no spec yet.
fn empty_spec(date: &str) -> String {
    format!("# Project Specification\n\n**Last Updated:** {date}\n\n{DEV_LOG_HEADING}\n")
}

/// Deterministic placement: refresh the timestamp, guarantee the log
/// heading, append the dated entry at the end.
fn apply_entry(current: &str, entry_body: &str, date: &str) -> String {
    let mut doc = if current.trim().is_empty() {
        empty_spec(date)
    } else {
        current.to_string()
    };

    let stamp = format!("**Last Updated:** {date}");
    if LAST_UPDATED.is_match(&doc) {
        doc = LAST_UPDATED.replace(&doc, stamp.as_str()).into_owned();
    } else {
        // No stamp line yet: put one right under the title line.
        doc = match doc.split_once('\n') {
            Some((first, rest)) => format!("{first}\n\n{stamp}\n{rest}"),
            None => format!("{doc}\n\n{stamp}\n"),
        };
    }

    if !doc.contains(DEV_LOG_HEADING) {
        if !doc.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str(&format!("\n{DEV_LOG_HEADING}\n"));
    }

    if !doc.ends_with('\n') {
        doc.push('\n');
    }
    doc.push_str(&format!("\n### [{date}]\n\n{}\n", entry_body.trim_end()));
    doc
}

pub(crate) async fn run(deps: &WorkerDeps, ctx: &TriggerContext) -> TaskOutcome {
    let current = match deps.host.get_file(SPEC_PATH, &ctx.event.commit_sha).await {
        Ok(Some(file)) => file.content,
        Ok(None) => String::new(),
        Err(e) => {
            return TaskOutcome::failed(
                TaskName::SpecUpdate,
                classify_host_error(&e),
                format!("failed to read {SPEC_PATH}: {e}"),
            );
        }
    };

    let prompt = build_prompt(ctx);
    debug!(commit = %ctx.event.commit_sha, spec_len = current.len(), "spec update: generating");

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
                TaskName::SpecUpdate,
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

    let date = Utc::now().format("%Y-%m-%d").to_string();
    let updated = apply_entry(&current, strip_outer_fence(&completion.text), &date);

    let mut out = TaskOutcome::success(TaskName::SpecUpdate, "appended development log entry")
        .with_metrics(metrics);
    out.proposed = Some(ProposedFile {
        path: SPEC_PATH.to_string(),
        content: updated,
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = "- **Summary**: added x\n- **Decisions**: none\n- **Next Steps**: tests";

    #[test]
    fn entry_is_appended_at_the_end_with_dated_heading() {
        let current = "# Spec\n\n**Last Updated:** 2024-01-01\n\n## Development Log\n\n### [2024-01-01]\n\nolder\n";
        let out = apply_entry(current, ENTRY, "2025-06-01");
        assert!(out.ends_with("### [2025-06-01]\n\n- **Summary**: added x\n- **Decisions**: none\n- **Next Steps**: tests\n"));
        // The older entry stays in place, before the new one.
        assert!(out.find("older").unwrap() < out.find("[2025-06-01]").unwrap());
    }

    #[test]
    fn last_updated_stamp_is_refreshed_in_place() {
        let current = "# Spec\n\n**Last Updated:** 2024-01-01\n\n## Development Log\n";
        let out = apply_entry(current, ENTRY, "2025-06-01");
        assert!(out.contains("**Last Updated:** 2025-06-01"));
        assert!(!out.contains("2024-01-01\n\n## Development Log"));
        assert_eq!(out.matches("**Last Updated:**").count(), 1);
    }

    #[test]
    fn missing_stamp_and_heading_are_created() {
        let current = "# Spec\n\nIntro paragraph.\n";
        let out = apply_entry(current, ENTRY, "2025-06-01");
        assert!(out.contains("**Last Updated:** 2025-06-01"));
        assert!(out.contains(DEV_LOG_HEADING));
    }

    #[test]
    fn empty_document_gets_the_full_skeleton() {
        let out = apply_entry("", ENTRY, "2025-06-01");
        assert!(out.starts_with("# Project Specification"));
        assert!(out.contains(DEV_LOG_HEADING));
        assert!(out.contains("### [2025-06-01]"));
    }
}
