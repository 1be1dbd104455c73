//! GitHub MCP tools
//!
//! Issue tracking tools bound to the single repository named by
//! `GITHUB_REPO`. Every tool shares one [`GithubClient`].

use crate::clients::config::GithubConfig;
use crate::clients::github::{CreateIssueParams, GithubClient, Issue, IssueState};
use crate::clients::UpstreamError;
use crate::gateway::GatewayError;
use crate::integration::Integration;
use crate::server::{parse_args, McpServerError, McpServerResult, Tool, ToolContext};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Maximum page size accepted by the issues endpoint.
const MAX_ISSUES: u32 = 100;

/// Tool to open a new issue.
pub struct CreateIssueTool {
    client: Arc<GithubClient>,
}

#[async_trait]
impl Tool for CreateIssueTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create_github_issue", "Create a new issue in the configured GitHub repository")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Issue title"
                    },
                    "body": {
                        "type": "string",
                        "description": "Issue description (Markdown)"
                    },
                    "labels": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Labels to apply"
                    },
                    "assignees": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "GitHub usernames to assign"
                    }
                },
                "required": ["title"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "create_github_issue", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: CreateIssueParams = parse_args(args)?;
        if params.title.trim().is_empty() {
            return Err(McpServerError::InvalidParams("title must not be empty".to_string()));
        }

        let issue = self.client.create_issue(&params).await?;
        info!(number = issue.number, "Created GitHub issue");

        Ok(ToolResult::text(format!(
            "Created issue #{}: {}\nURL: {}\nState: {}",
            issue.number, issue.title, issue.html_url, issue.state
        )))
    }
}

/// Tool to list issues.
pub struct ListIssuesTool {
    client: Arc<GithubClient>,
}

#[async_trait]
impl Tool for ListIssuesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_github_issues", "List issues in the configured GitHub repository")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "state": {
                        "type": "string",
                        "enum": ["open", "closed", "all"],
                        "description": "Issue state filter",
                        "default": "open"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_ISSUES,
                        "description": "Maximum number of issues to return",
                        "default": 10
                    }
                },
                "required": []
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "list_github_issues", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ListIssuesParams = parse_args(args)?;
        let limit = params.limit.clamp(1, MAX_ISSUES);

        let issues = self.client.list_issues(params.state, limit).await?;
        debug!(count = issues.len(), "Listed GitHub issues");

        if issues.is_empty() {
            return Ok(ToolResult::text(format!(
                "No {} issues found in {}",
                params.state.as_str(),
                self.client.repo()
            )));
        }

        let mut text = format!(
            "Found {} {} issues in {}:\n",
            issues.len(),
            params.state.as_str(),
            self.client.repo()
        );
        for issue in &issues {
            text.push('\n');
            text.push_str(&issue_line(issue));
        }
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct ListIssuesParams {
    #[serde(default)]
    state: IssueState,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    10
}

/// Tool to fetch one issue.
pub struct GetIssueTool {
    client: Arc<GithubClient>,
}

#[async_trait]
impl Tool for GetIssueTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_github_issue", "Get the details of a GitHub issue")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "issue_number": {
                        "type": "integer",
                        "description": "Issue number"
                    }
                },
                "required": ["issue_number"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "get_github_issue", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: IssueNumberParams = parse_args(args)?;
        let issue = self.client.get_issue(params.issue_number).await?;
        Ok(ToolResult::text(issue_details(&issue)))
    }
}

#[derive(Debug, Deserialize)]
struct IssueNumberParams {
    issue_number: u64,
}

/// Tool to comment on an issue.
pub struct AddCommentTool {
    client: Arc<GithubClient>,
}

#[async_trait]
impl Tool for AddCommentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("add_github_issue_comment", "Add a comment to a GitHub issue")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "issue_number": {
                        "type": "integer",
                        "description": "Issue number"
                    },
                    "body": {
                        "type": "string",
                        "description": "Comment text (Markdown)"
                    }
                },
                "required": ["issue_number", "body"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "add_github_issue_comment", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: AddCommentParams = parse_args(args)?;
        let comment = self.client.add_comment(params.issue_number, &params.body).await?;

        Ok(ToolResult::text(format!(
            "Added comment to issue #{}\nURL: {}",
            params.issue_number, comment.html_url
        )))
    }
}

#[derive(Debug, Deserialize)]
struct AddCommentParams {
    issue_number: u64,
    body: String,
}

/// One line per issue in list output.
fn issue_line(issue: &Issue) -> String {
    let mut line = format!("#{}: {} [{}]", issue.number, issue.title, issue.state);
    if issue.is_pull_request() {
        line.push_str(" (pull request)");
    }
    if !issue.labels.is_empty() {
        let labels: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
        line.push_str(&format!(" labels: {}", labels.join(", ")));
    }
    line.push_str(&format!("\n  {}", issue.html_url));
    line
}

fn issue_details(issue: &Issue) -> String {
    let mut text = format!("Issue #{}: {}\nState: {}", issue.number, issue.title, issue.state);
    if let Some(user) = &issue.user {
        text.push_str(&format!("\nAuthor: {}", user.login));
    }
    if !issue.labels.is_empty() {
        let labels: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
        text.push_str(&format!("\nLabels: {}", labels.join(", ")));
    }
    if !issue.assignees.is_empty() {
        let assignees: Vec<&str> = issue.assignees.iter().map(|u| u.login.as_str()).collect();
        text.push_str(&format!("\nAssignees: {}", assignees.join(", ")));
    }
    text.push_str(&format!("\nComments: {}", issue.comments));
    if let Some(created_at) = &issue.created_at {
        text.push_str(&format!("\nCreated: {}", created_at));
    }
    text.push_str(&format!("\nURL: {}", issue.html_url));
    if let Some(body) = issue.body.as_deref().filter(|b| !b.trim().is_empty()) {
        text.push_str("\n\n");
        text.push_str(body);
    }
    text
}

/// Get all GitHub tools.
pub fn github_tools(client: Arc<GithubClient>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CreateIssueTool { client: Arc::clone(&client) }),
        Arc::new(ListIssuesTool { client: Arc::clone(&client) }),
        Arc::new(GetIssueTool { client: Arc::clone(&client) }),
        Arc::new(AddCommentTool { client }),
    ]
}

/// The GitHub gateway integration.
pub struct GithubIntegration {
    client: Arc<GithubClient>,
}

impl GithubIntegration {
    /// Build the integration from explicit configuration.
    pub fn new(config: &GithubConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: Arc::new(GithubClient::new(config)?),
        })
    }
}

#[async_trait]
impl Integration for GithubIntegration {
    const SERVICE: &'static str = "github-mcp-server";
    const DEFAULT_PORT: u16 = 8001;

    fn from_env() -> Result<Self, GatewayError> {
        let config = GithubConfig::from_env()?;
        info!(
            repo = %config.repo,
            api_url = %config.api_url,
            token = %config.token.masked(),
            "Loaded GitHub configuration"
        );
        Self::new(&config).map_err(GatewayError::Setup)
    }

    fn description(&self) -> &'static str {
        "GitHub issue tracking tools over MCP"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        github_tools(Arc::clone(&self.client))
    }

    async fn probe(&self) -> Result<Map<String, Value>, UpstreamError> {
        let repository = self.client.get_repository().await?;

        let mut fields = Map::new();
        fields.insert("repo".to_string(), Value::from(self.client.repo()));
        fields.insert("repo_full_name".to_string(), Value::from(repository.full_name));
        fields.insert("private".to_string(), Value::from(repository.private));
        Ok(fields)
    }
}
