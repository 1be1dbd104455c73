//! GitHub service client.
//!
//! Typed facade over the GitHub REST API, scoped to the single repository
//! named in the gateway configuration.

use super::config::GithubConfig;
use super::upstream::{UpstreamClient, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// GitHub REST API version pinned in every request.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// GitHub service client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    /// Authenticated upstream client.
    upstream: UpstreamClient,

    /// Target repository as `owner/name`.
    repo: String,
}

impl GithubClient {
    /// Create a new GitHub client.
    pub fn new(config: &GithubConfig) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::builder("GitHub", config.api_url.clone())
            .bearer(&config.token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", GITHUB_API_VERSION)
            .build()?;

        Ok(Self {
            upstream,
            repo: config.repo.clone(),
        })
    }

    /// Target repository.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Fetch repository metadata; doubles as the connectivity probe.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn get_repository(&self) -> Result<Repository, UpstreamError> {
        debug!("Fetching repository metadata");
        let value = self
            .upstream
            .get(&format!("/repos/{}", self.repo), &[])
            .await?;
        self.upstream.decode(value)
    }

    /// Create an issue.
    #[instrument(skip(self, params), fields(repo = %self.repo))]
    pub async fn create_issue(&self, params: &CreateIssueParams) -> Result<Issue, UpstreamError> {
        debug!("Creating issue: {}", params.title);
        let value = self
            .upstream
            .post(&format!("/repos/{}/issues", self.repo), params)
            .await?;
        self.upstream.decode(value)
    }

    /// List issues in the given state, newest first.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn list_issues(&self, state: IssueState, per_page: u32) -> Result<Vec<Issue>, UpstreamError> {
        debug!("Listing {} issues", state.as_str());
        let value = self
            .upstream
            .get(
                &format!("/repos/{}/issues", self.repo),
                &[
                    ("state", state.as_str().to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;
        self.upstream.decode(value)
    }

    /// Fetch one issue by number.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn get_issue(&self, number: u64) -> Result<Issue, UpstreamError> {
        let value = self
            .upstream
            .get(&format!("/repos/{}/issues/{}", self.repo, number), &[])
            .await?;
        self.upstream.decode(value)
    }

    /// Add a comment to an issue.
    #[instrument(skip(self, body), fields(repo = %self.repo))]
    pub async fn add_comment(&self, number: u64, body: &str) -> Result<IssueComment, UpstreamError> {
        let value = self
            .upstream
            .post(
                &format!("/repos/{}/issues/{}/comments", self.repo, number),
                &serde_json::json!({ "body": body }),
            )
            .await?;
        self.upstream.decode(value)
    }
}

/// Issue state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// Open issues.
    #[default]
    Open,
    /// Closed issues.
    Closed,
    /// Both.
    All,
}

impl IssueState {
    /// Query-string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

/// Parameters for issue creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIssueParams {
    /// Issue title.
    pub title: String,

    /// Markdown body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Label names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// Assignee logins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

/// Repository metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`.
    pub full_name: String,

    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
}

/// An issue (or pull request, which GitHub lists alongside issues).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number.
    pub number: u64,

    /// Title.
    pub title: String,

    /// `open` or `closed`.
    pub state: String,

    /// Web URL.
    pub html_url: String,

    /// Markdown body.
    #[serde(default)]
    pub body: Option<String>,

    /// Author.
    #[serde(default)]
    pub user: Option<User>,

    /// Labels.
    #[serde(default)]
    pub labels: Vec<Label>,

    /// Assignees.
    #[serde(default)]
    pub assignees: Vec<User>,

    /// Comment count.
    #[serde(default)]
    pub comments: u64,

    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,

    /// Present when the entry is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// Whether the entry is a pull request.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// A GitHub user reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Login name.
    pub login: String,
}

/// A label attached to an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
}

/// A created issue comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    /// Comment ID.
    pub id: u64,

    /// Web URL.
    pub html_url: String,
}
