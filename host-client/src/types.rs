//! Normalized data model for the host surface consumed by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commit metadata (author, message, parents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub author_name: Option<String>,
    pub message: String,
    pub parents: Vec<String>,
    pub authored_at: Option<DateTime<Utc>>,
}

/// Pull request metadata used by the orchestrator and workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub head_branch: String,
    pub head_sha: String,
    pub base_branch: String,
    pub html_url: Option<String>,
}

/// Issue metadata (for review-as-issue delivery and listings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub labels: Vec<String>,
}

/// A file stored in the repository, as returned by the contents surface.
#[derive(Debug, Clone)]
pub struct RepoFile {
    /// Decoded UTF-8 content.
    pub content: String,
    /// Blob sha needed to update the file in place.
    pub sha: String,
}
