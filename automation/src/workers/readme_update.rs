//! README maintenance worker.
//!
//! Regenerates only the sections whose invariants the diff touched (new
//! public entry points, dependencies, commands) while preserving the
//! document's structure and tone. The worker emits a proposed blob; the
//! orchestrator owns PR composition.

use session_store::{TaskMetrics, TaskName};
use tracing::debug;

use llm_gateway::gateway::GenerateRequest;

use crate::errors::{classify_gateway_error, classify_host_error};
use crate::trigger::TriggerContext;
use crate::workers::{ProposedFile, TaskOutcome, WorkerDeps, strip_outer_fence};

const README_PATH: &str = "README.md";

const SYSTEM_PROMPT: &str = r#"You maintain a project's README.
- Output the complete updated README and nothing else.
- Preserve the existing structure, headings, and tone.
- Touch only sections affected by the change: public entry points,
  dependencies, commands, usage examples.
- If nothing in the README is affected, return the document unchanged."#;

fn build_prompt(current: &str, ctx: &TriggerContext) -> String {
    format!(
        "# Current README.md\n{}\n\
         \n# Change Just Made (unified diff)\n```diff\n{}\n```\n\
         \n# Task\nReturn the full README.md after the change.",
        if current.is_empty() {
            "(the repository has no README yet)"
        } else {
            current
        },
        ctx.diff_text
    )
}

pub(crate) async fn run(deps: &WorkerDeps, ctx: &TriggerContext) -> TaskOutcome {
    let current = match deps
        .host
        .get_file(README_PATH, &ctx.event.commit_sha)
        .await
    {
        Ok(Some(file)) => file.content,
        Ok(None) => String::new(),
        Err(e) => {
            return TaskOutcome::failed(
                TaskName::ReadmeUpdate,
                classify_host_error(&e),
                format!("failed to read {README_PATH}: {e}"),
            );
        }
    };

    let prompt = build_prompt(&current, ctx);
    debug!(commit = %ctx.event.commit_sha, readme_len = current.len(), "readme update: generating");

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
                TaskName::ReadmeUpdate,
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

    let updated = normalize(&completion.text);
    if updated == current.trim_end() {
        return TaskOutcome::skipped(TaskName::ReadmeUpdate, "no_changes").with_metrics(metrics);
    }

    let mut out = TaskOutcome::success(TaskName::ReadmeUpdate, "proposed README.md update")
        .with_metrics(metrics);
    out.proposed = Some(ProposedFile {
        path: README_PATH.to_string(),
        content: format!("{updated}\n"),
    });
    out
}

/// Canonical form used for the textual-equality skip check.
fn normalize(generated: &str) -> String {
    strip_outer_fence(generated).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_unwraps_fences_and_trailing_newlines() {
        assert_eq!(normalize("```markdown\n# T\nbody\n```"), "# T\nbody");
        assert_eq!(normalize("# T\nbody\n\n"), "# T\nbody");
    }

    #[test]
    fn equality_check_matches_unchanged_output() {
        let current = "# Project\n\nUsage.\n";
        assert_eq!(normalize("# Project\n\nUsage."), current.trim_end());
    }
}
