//! Grouped automation PR composer.
//!
//! All doc blobs a run produces land on one branch per source PR,
//! `automation/pr-<N>-docs` (N falls back to the short commit id for
//! PR-less pushes). The branch is a logical singleton: create-or-reset
//! from the event's head commit, then commit blobs in a stable order and
//! open-or-update a single pull request.

use host_client::{HostClient, HostError};
use session_store::TaskName;
use tracing::{debug, info};

use crate::trigger::TriggerContext;
use crate::workers::{ProposedFile, TaskOutcome};

/// Stable commit order inside the automation branch.
const FILE_ORDER: &[&str] = &["README.md", "spec.md", "CODE_REVIEW.md"];

/// Whether a grouped PR is warranted at all: only readme_update or
/// spec_update producing content opens one. The review log rides along in
/// the commit list once the gate passes, but never opens a PR by itself.
pub fn should_compose(outcomes: &[TaskOutcome]) -> bool {
    outcomes.iter().any(|o| {
        matches!(o.name, TaskName::ReadmeUpdate | TaskName::SpecUpdate) && o.proposed.is_some()
    })
}

/// Branch carrying the grouped updates for the given key.
pub fn branch_name(key: &str) -> String {
    format!("automation/pr-{key}-docs")
}

/// Title of the grouped PR.
pub fn pr_title(key: &str) -> String {
    format!("🤖 Automation updates for PR #{key}")
}

/// Orders proposed files by [`FILE_ORDER`]; unknown paths sort last,
/// keeping their relative order.
pub fn order_files(mut files: Vec<ProposedFile>) -> Vec<ProposedFile> {
    let rank = |p: &str| {
        FILE_ORDER
            .iter()
            .position(|known| *known == p)
            .unwrap_or(FILE_ORDER.len())
    };
    files.sort_by_key(|f| rank(&f.path));
    files
}

fn pr_body(ctx: &TriggerContext, files: &[ProposedFile]) -> String {
    let source = match ctx.event.pr_number {
        Some(n) => format!("#{n}"),
        None => format!("commit `{}`", ctx.event.commit_sha),
    };
    let mut body = format!(
        "Automated documentation updates for {source}.\n\nFiles updated:\n"
    );
    for f in files {
        body.push_str(&format!("- `{}`\n", f.path));
    }
    body.push_str(&format!(
        "\nGenerated from commit `{}`.\n",
        ctx.event.commit_sha
    ));
    body
}

/// Composes the grouped PR and returns its number.
///
/// Idempotent per source PR: re-running resets the branch to the current
/// head commit and updates the existing pull request instead of opening a
/// second one.
pub async fn compose(
    host: &HostClient,
    ctx: &TriggerContext,
    files: Vec<ProposedFile>,
) -> Result<u64, HostError> {
    let key = ctx.automation_key();
    let branch = branch_name(&key);
    let files = order_files(files);

    debug!(%branch, files = files.len(), "composing grouped automation PR");
    host.create_or_reset_branch(&branch, &ctx.event.commit_sha).await?;

    let short: String = ctx.event.commit_sha.chars().take(8).collect();
    for f in &files {
        host.put_file(
            &branch,
            &f.path,
            &f.content,
            &format!("docs: automated update of {} for {}", f.path, short),
        )
        .await?;
    }

    let title = pr_title(&key);
    let body = pr_body(ctx, &files);
    // Docs flow into the source PR's branch when there is one; plain
    // pushes get the updates proposed against their own branch.
    let base = match &ctx.pr {
        Some(pr) => pr.head_branch.clone(),
        None => ctx.event.branch.clone(),
    };

    let number = match host.find_open_pr_by_head(&branch).await? {
        Some(existing) => {
            host.update_pr(existing.number, Some(&title), Some(&body)).await?;
            info!(pr = existing.number, %branch, "updated grouped automation PR");
            existing.number
        }
        None => {
            let created = host.create_pr(&title, &branch, &base, &body).await?;
            info!(pr = created.number, %branch, "opened grouped automation PR");
            created.number
        }
    };
    Ok(number)
}
