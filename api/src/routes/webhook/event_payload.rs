//! Serde shapes for the host's webhook payloads and their normalization
//! into [`RepoEvent`].

use serde::Deserialize;

use automation::{EventKind, PrAction, RepoEvent};

/// Branch-deletion pushes carry an all-zero head sha.
const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// `push` event payload (the fields this service reads).
#[derive(Debug, Deserialize)]
pub struct PushEventPayload {
    /// e.g. "refs/heads/main"
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Head commit after the push.
    pub after: String,
    #[serde(default)]
    pub deleted: bool,
}

/// `pull_request` event payload (the fields this service reads).
#[derive(Debug, Deserialize)]
pub struct PullRequestEventPayload {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequestBody,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestBody {
    pub head: PullRequestHead,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestHead {
    #[serde(rename = "ref")]
    pub branch: String,
    pub sha: String,
}

/// Why a structurally-valid payload is still not actionable.
#[derive(Debug, PartialEq, Eq)]
pub enum NotActionable {
    BranchDeleted,
    EmptyCommit,
}

impl PushEventPayload {
    /// Normalizes into a [`RepoEvent`], rejecting deletions/empty pushes.
    pub fn into_event(self) -> Result<RepoEvent, NotActionable> {
        if self.deleted || self.after == ZERO_SHA {
            return Err(NotActionable::BranchDeleted);
        }
        if self.after.trim().is_empty() {
            return Err(NotActionable::EmptyCommit);
        }
        let branch = self
            .git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.git_ref)
            .to_string();
        Ok(RepoEvent {
            kind: EventKind::Push,
            action: None,
            commit_sha: self.after,
            branch,
            pr_number: None,
        })
    }
}

impl PullRequestEventPayload {
    pub fn into_event(self) -> RepoEvent {
        RepoEvent {
            kind: EventKind::PullRequest,
            action: Some(PrAction::parse(&self.action)),
            commit_sha: self.pull_request.head.sha,
            branch: self.pull_request.head.branch,
            pr_number: Some(self.number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_payload_normalizes_branch_and_sha() {
        let p: PushEventPayload = serde_json::from_str(
            r#"{"ref":"refs/heads/main","after":"abc123","deleted":false}"#,
        )
        .unwrap();
        let ev = p.into_event().unwrap();
        assert_eq!(ev.branch, "main");
        assert_eq!(ev.commit_sha, "abc123");
        assert_eq!(ev.kind, EventKind::Push);
    }

    #[test]
    fn branch_deletion_is_not_actionable() {
        let p: PushEventPayload = serde_json::from_str(&format!(
            r#"{{"ref":"refs/heads/gone","after":"{ZERO_SHA}","deleted":true}}"#
        ))
        .unwrap();
        assert_eq!(p.into_event().unwrap_err(), NotActionable::BranchDeleted);
    }

    #[test]
    fn pull_request_payload_normalizes() {
        let p: PullRequestEventPayload = serde_json::from_str(
            r#"{
                "action": "synchronize",
                "number": 67,
                "pull_request": { "head": { "ref": "feature/x", "sha": "def456" } }
            }"#,
        )
        .unwrap();
        let ev = p.into_event();
        assert_eq!(ev.pr_number, Some(67));
        assert_eq!(ev.action, Some(PrAction::Synchronize));
        assert_eq!(ev.commit_sha, "def456");
    }
}
