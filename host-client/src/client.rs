//! The host REST client (GitHub-flavored v3 surface).
//!
//! Endpoints used:
//! - GET  /repos/{repo}/commits/{sha}            (metadata; diff via media type)
//! - GET  /repos/{repo}/pulls/{n}                (metadata; diff via media type)
//! - GET  /repos/{repo}/commits/{sha}/pulls      (containing PRs)
//! - POST /repos/{repo}/commits/{sha}/comments
//! - POST /repos/{repo}/pulls/{n}/reviews        (event=COMMENT)
//! - POST /repos/{repo}/issues[/{n}/comments]
//! - GET/POST/PATCH /repos/{repo}/git/ref(s)     (branch create-or-reset)
//! - GET/PUT /repos/{repo}/contents/{path}       (file read / create-or-update)
//! - GET/POST/PATCH /repos/{repo}/pulls          (grouped automation PR)

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Method, header};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::{HostError, HostResult};
use crate::retry::RetryPolicy;
use crate::types::{CommitInfo, IssueInfo, PullRequestInfo, RepoFile};

const MEDIA_JSON: &str = "application/vnd.github+json";
const MEDIA_DIFF: &str = "application/vnd.github.v3.diff";

/// Runtime configuration for the host client.
#[derive(Debug, Clone)]
pub struct HostClientConfig {
    /// API base, e.g. "https://api.github.com".
    pub base_api: String,
    /// Repository in "owner/name" form.
    pub repo: String,
    /// Access token (PAT or app token).
    pub token: String,
    /// Retry tuning for transient faults.
    pub retry: RetryPolicy,
}

/// Thin typed client over the host REST surface.
#[derive(Debug, Clone)]
pub struct HostClient {
    http: Client,
    base_api: String,
    repo: String,
    retry: RetryPolicy,
}

impl HostClient {
    /// Constructs a client with auth baked into default headers.
    ///
    /// # Errors
    /// [`HostError::InvalidResponse`] when the repo is not "owner/name";
    /// network-level construction failures map through `reqwest`.
    pub fn new(cfg: HostClientConfig) -> HostResult<Self> {
        if !cfg.repo.contains('/') {
            return Err(HostError::InvalidResponse(format!(
                "repo must be owner/name, got {:?}",
                cfg.repo
            )));
        }

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", cfg.token))
            .map_err(|e| HostError::InvalidResponse(format!("invalid token header: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(MEDIA_JSON));

        let http = Client::builder()
            .user_agent("repo-autopilot/0.1")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_api: cfg.base_api.trim_end_matches('/').to_string(),
            repo: cfg.repo,
            retry: cfg.retry,
        })
    }

    /* ----------------------------- commits ----------------------------- */

    /// Fetches commit metadata (author, message, parents).
    pub async fn get_commit(&self, sha: &str) -> HostResult<CommitInfo> {
        let path = format!("/repos/{}/commits/{}", self.repo, sha);
        let resp = self.execute(Method::GET, &path, MEDIA_JSON, None).await?;
        let raw: GhCommit = resp.json().await.map_err(decode_err)?;
        Ok(CommitInfo {
            sha: raw.sha,
            author_name: raw.commit.author.as_ref().and_then(|a| a.name.clone()),
            message: raw.commit.message,
            parents: raw.parents.into_iter().map(|p| p.sha).collect(),
            authored_at: raw.commit.author.and_then(|a| a.date),
        })
    }

    /// Fetches the unified diff for a commit.
    pub async fn get_commit_diff(&self, sha: &str) -> HostResult<String> {
        let path = format!("/repos/{}/commits/{}", self.repo, sha);
        let resp = self.execute(Method::GET, &path, MEDIA_DIFF, None).await?;
        Ok(resp.text().await.map_err(HostError::from)?)
    }

    /* ------------------------------ pulls ------------------------------ */

    /// Fetches pull request metadata.
    pub async fn get_pr(&self, number: u64) -> HostResult<PullRequestInfo> {
        let path = format!("/repos/{}/pulls/{}", self.repo, number);
        let resp = self.execute(Method::GET, &path, MEDIA_JSON, None).await?;
        let raw: GhPull = resp.json().await.map_err(decode_err)?;
        Ok(raw.into())
    }

    /// Fetches the unified diff for a pull request.
    pub async fn get_pr_diff(&self, number: u64) -> HostResult<String> {
        let path = format!("/repos/{}/pulls/{}", self.repo, number);
        let resp = self.execute(Method::GET, &path, MEDIA_DIFF, None).await?;
        Ok(resp.text().await.map_err(HostError::from)?)
    }

    /// Lists open pull requests.
    pub async fn list_open_prs(&self) -> HostResult<Vec<PullRequestInfo>> {
        let path = format!("/repos/{}/pulls?state=open&per_page=100", self.repo);
        let resp = self.execute(Method::GET, &path, MEDIA_JSON, None).await?;
        let raw: Vec<GhPull> = resp.json().await.map_err(decode_err)?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    /// Finds an open pull request containing the commit, if any.
    pub async fn find_pr_for_commit(&self, sha: &str) -> HostResult<Option<PullRequestInfo>> {
        let path = format!("/repos/{}/commits/{}/pulls", self.repo, sha);
        let resp = self.execute(Method::GET, &path, MEDIA_JSON, None).await?;
        let raw: Vec<GhPull> = resp.json().await.map_err(decode_err)?;
        Ok(raw
            .into_iter()
            .map(PullRequestInfo::from)
            .find(|pr| pr.state == "open"))
    }

    /// Finds an open pull request whose head is the given branch.
    pub async fn find_open_pr_by_head(&self, branch: &str) -> HostResult<Option<PullRequestInfo>> {
        let owner = self.repo.split('/').next().unwrap_or_default();
        let path = format!(
            "/repos/{}/pulls?state=open&head={}:{}",
            self.repo, owner, branch
        );
        let resp = self.execute(Method::GET, &path, MEDIA_JSON, None).await?;
        let raw: Vec<GhPull> = resp.json().await.map_err(decode_err)?;
        Ok(raw.into_iter().next().map(Into::into))
    }

    /// Opens a pull request.
    pub async fn create_pr(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> HostResult<PullRequestInfo> {
        let path = format!("/repos/{}/pulls", self.repo);
        let payload = json!({ "title": title, "head": head, "base": base, "body": body });
        let resp = self
            .execute(Method::POST, &path, MEDIA_JSON, Some(payload))
            .await?;
        let raw: GhPull = resp.json().await.map_err(decode_err)?;
        Ok(raw.into())
    }

    /// Updates an existing pull request's title/body.
    pub async fn update_pr(
        &self,
        number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> HostResult<()> {
        let path = format!("/repos/{}/pulls/{}", self.repo, number);
        let mut payload = serde_json::Map::new();
        if let Some(t) = title {
            payload.insert("title".into(), json!(t));
        }
        if let Some(b) = body {
            payload.insert("body".into(), json!(b));
        }
        self.execute(Method::PATCH, &path, MEDIA_JSON, Some(payload.into()))
            .await?;
        Ok(())
    }

    /* ----------------------------- comments ----------------------------- */

    /// Posts a comment on a commit.
    pub async fn post_commit_comment(&self, sha: &str, body: &str) -> HostResult<()> {
        let path = format!("/repos/{}/commits/{}/comments", self.repo, sha);
        self.execute(Method::POST, &path, MEDIA_JSON, Some(json!({ "body": body })))
            .await?;
        Ok(())
    }

    /// Posts a non-blocking review (event=COMMENT) on a pull request.
    pub async fn post_pr_review(&self, number: u64, body: &str) -> HostResult<()> {
        let path = format!("/repos/{}/pulls/{}/reviews", self.repo, number);
        self.execute(
            Method::POST,
            &path,
            MEDIA_JSON,
            Some(json!({ "body": body, "event": "COMMENT" })),
        )
        .await?;
        Ok(())
    }

    /// Posts a comment on an issue (or a PR's conversation).
    pub async fn post_issue_comment(&self, number: u64, body: &str) -> HostResult<()> {
        let path = format!("/repos/{}/issues/{}/comments", self.repo, number);
        self.execute(Method::POST, &path, MEDIA_JSON, Some(json!({ "body": body })))
            .await?;
        Ok(())
    }

    /// Opens an issue; returns its number.
    pub async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> HostResult<u64> {
        let path = format!("/repos/{}/issues", self.repo);
        let resp = self
            .execute(
                Method::POST,
                &path,
                MEDIA_JSON,
                Some(json!({ "title": title, "body": body, "labels": labels })),
            )
            .await?;
        let raw: GhIssue = resp.json().await.map_err(decode_err)?;
        Ok(raw.number)
    }

    /// Lists issues, optionally filtered by label.
    pub async fn list_issues(&self, label: Option<&str>) -> HostResult<Vec<IssueInfo>> {
        let mut path = format!("/repos/{}/issues?state=open&per_page=100", self.repo);
        if let Some(l) = label {
            path.push_str("&labels=");
            path.push_str(l);
        }
        let resp = self.execute(Method::GET, &path, MEDIA_JSON, None).await?;
        let raw: Vec<GhIssue> = resp.json().await.map_err(decode_err)?;
        Ok(raw
            .into_iter()
            .map(|i| IssueInfo {
                number: i.number,
                title: i.title,
                state: i.state,
                labels: i.labels.into_iter().map(|l| l.name).collect(),
            })
            .collect())
    }

    /* ------------------------- branches & files ------------------------- */

    /// Resolves a branch head sha, or `None` when the branch does not exist.
    pub async fn get_branch_sha(&self, branch: &str) -> HostResult<Option<String>> {
        let path = format!("/repos/{}/git/ref/heads/{}", self.repo, branch);
        match self.execute(Method::GET, &path, MEDIA_JSON, None).await {
            Ok(resp) => {
                let raw: GhRef = resp.json().await.map_err(decode_err)?;
                Ok(Some(raw.object.sha))
            }
            Err(HostError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates the branch at `base_sha`, or force-resets it when it exists.
    ///
    /// This makes the branch a logical singleton: repeated calls converge
    /// on the requested base instead of failing on "already exists".
    pub async fn create_or_reset_branch(&self, branch: &str, base_sha: &str) -> HostResult<()> {
        if self.get_branch_sha(branch).await?.is_some() {
            let path = format!("/repos/{}/git/refs/heads/{}", self.repo, branch);
            self.execute(
                Method::PATCH,
                &path,
                MEDIA_JSON,
                Some(json!({ "sha": base_sha, "force": true })),
            )
            .await?;
            debug!(branch, "branch reset to base");
        } else {
            let path = format!("/repos/{}/git/refs", self.repo);
            self.execute(
                Method::POST,
                &path,
                MEDIA_JSON,
                Some(json!({ "ref": format!("refs/heads/{branch}"), "sha": base_sha })),
            )
            .await?;
            debug!(branch, "branch created");
        }
        Ok(())
    }

    /// Reads a file at a ref, or `None` when absent.
    pub async fn get_file(&self, path: &str, git_ref: &str) -> HostResult<Option<RepoFile>> {
        let url_path = format!("/repos/{}/contents/{}?ref={}", self.repo, path, git_ref);
        match self.execute(Method::GET, &url_path, MEDIA_JSON, None).await {
            Ok(resp) => {
                let raw: GhContent = resp.json().await.map_err(decode_err)?;
                let compact: String =
                    raw.content.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = BASE64.decode(compact).map_err(|e| {
                    HostError::InvalidResponse(format!("bad base64 content: {e}"))
                })?;
                let content = String::from_utf8(bytes).map_err(|e| {
                    HostError::InvalidResponse(format!("non-utf8 file content: {e}"))
                })?;
                Ok(Some(RepoFile {
                    content,
                    sha: raw.sha,
                }))
            }
            Err(HostError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates or updates a file on a branch.
    ///
    /// The current blob sha is fetched automatically so callers never have
    /// to track it.
    pub async fn put_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> HostResult<()> {
        let existing = self.get_file(path, branch).await?;

        let url_path = format!("/repos/{}/contents/{}", self.repo, path);
        let mut payload = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(file) = existing {
            payload["sha"] = json!(file.sha);
        }
        self.execute(Method::PUT, &url_path, MEDIA_JSON, Some(payload))
            .await?;
        Ok(())
    }

    /* ----------------------------- internals ----------------------------- */

    /// Sends one request with bounded retries on transient faults / 429.
    ///
    /// Never logs bodies; logs method, path, status, and attempt only.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        accept: &'static str,
        body: Option<serde_json::Value>,
    ) -> HostResult<reqwest::Response> {
        let url = format!("{}{}", self.base_api, path);
        let mut attempt = 0u32;
        loop {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(header::ACCEPT, accept);
            if let Some(b) = &body {
                req = req.json(b);
            }

            let result = req.send().await;
            let err = match result {
                Ok(resp) if resp.status().is_success() => {
                    debug!(%method, path, status = resp.status().as_u16(), "host request ok");
                    return Ok(resp);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = retry_after_secs(&resp);
                    let text = resp.text().await.unwrap_or_default();
                    HostError::from_status(status.as_u16(), retry_after, &text)
                }
                Err(e) => HostError::from(e),
            };

            if err.is_retryable() && attempt + 1 < self.retry.max_attempts {
                let hint = match &err {
                    HostError::RateLimited { retry_after_secs } => *retry_after_secs,
                    _ => None,
                };
                let delay = self.retry.delay_for(attempt, hint);
                warn!(
                    %method,
                    path,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "host request failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            warn!(%method, path, attempt, error = %err, "host request failed");
            return Err(err);
        }
    }
}

fn retry_after_secs(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn decode_err(e: reqwest::Error) -> HostError {
    HostError::InvalidResponse(format!("decode failed: {e}"))
}

/* ===========================================================================
Raw host payloads (mapped into normalized types above)
======================================================================== */

#[derive(Debug, Deserialize)]
struct GhCommit {
    sha: String,
    commit: GhCommitInner,
    #[serde(default)]
    parents: Vec<GhParent>,
}

#[derive(Debug, Deserialize)]
struct GhCommitInner {
    message: String,
    author: Option<GhCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct GhCommitAuthor {
    name: Option<String>,
    date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct GhParent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhPull {
    number: u64,
    title: String,
    state: String,
    head: GhPullRef,
    base: GhPullRef,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhPullRef {
    #[serde(rename = "ref")]
    branch: String,
    sha: String,
}

impl From<GhPull> for PullRequestInfo {
    fn from(raw: GhPull) -> Self {
        Self {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            head_branch: raw.head.branch,
            head_sha: raw.head.sha,
            base_branch: raw.base.branch,
            html_url: raw.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhRef {
    object: GhRefObject,
}

#[derive(Debug, Deserialize)]
struct GhRefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhContent {
    sha: String,
    #[serde(default)]
    content: String,
}
