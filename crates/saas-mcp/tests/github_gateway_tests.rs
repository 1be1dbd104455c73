//! End-to-end tests for the GitHub gateway tools.
//!
//! A wiremock server stands in for the GitHub REST API. Calls go through
//! `McpServer::invoke`, so these tests exercise the same path as a
//! `tools/call` request: argument parsing, the upstream request, and
//! result normalization.

use saas_mcp::clients::config::{GithubConfig, Secret};
use saas_mcp::health::{self, HealthServer, HealthState};
use saas_mcp::{GithubIntegration, Integration, McpServer, ToolCall, ToolResult};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test fixture providing a mock GitHub API and a server wired to it.
struct TestFixture {
    /// Mock GitHub server.
    github: MockServer,
    /// Dispatcher with the GitHub catalog registered.
    server: McpServer,
}

impl TestFixture {
    async fn new() -> Self {
        let github = MockServer::start().await;
        let integration = GithubIntegration::new(&config(&github)).unwrap();
        let server = McpServer::new("github-mcp-server", "0.1.0")
            .with_tools(integration.tools())
            .unwrap();
        Self { github, server }
    }

    async fn call(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        self.server.invoke(ToolCall::new(name, arguments)).await
    }
}

fn config(github: &MockServer) -> GithubConfig {
    GithubConfig {
        api_url: github.uri(),
        token: Secret::new("ghp_test_token"),
        repo: "octo/widgets".to_string(),
    }
}

fn issue_json(number: u64, title: &str, state: &str) -> serde_json::Value {
    json!({
        "id": 1000 + number,
        "number": number,
        "title": title,
        "state": state,
        "html_url": format!("https://github.com/octo/widgets/issues/{}", number),
        "body": "Steps to reproduce",
        "user": {"login": "octocat", "id": 1},
        "labels": [{"id": 1, "name": "bug", "color": "d73a4a"}],
        "assignees": [],
        "comments": 0,
        "created_at": "2024-05-01T10:00:00Z"
    })
}

// =============================================================================
// create_github_issue
// =============================================================================

#[tokio::test]
async fn test_create_issue() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues"))
        .and(header("authorization", "Bearer ghp_test_token"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header("x-github-api-version", "2022-11-28"))
        .and(body_json(json!({
            "title": "Bug X",
            "body": "Steps to reproduce",
            "labels": ["bug"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(42, "Bug X", "open")))
        .expect(1)
        .mount(&fixture.github)
        .await;

    let result = fixture
        .call(
            "create_github_issue",
            json!({"title": "Bug X", "body": "Steps to reproduce", "labels": ["bug"]}),
        )
        .await;

    assert!(!result.is_error);
    assert_eq!(
        result.text_content(),
        "Created issue #42: Bug X\nURL: https://github.com/octo/widgets/issues/42\nState: open"
    );
}

#[tokio::test]
async fn test_create_issue_missing_title() {
    let fixture = TestFixture::new().await;

    let result = fixture
        .call("create_github_issue", json!({"body": "no title"}))
        .await;

    assert!(result.is_error);
    assert!(result.text_content().contains("title"));
}

#[tokio::test]
async fn test_create_issue_validation_failure() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{"resource": "Issue", "code": "invalid", "field": "assignees"}]
        })))
        .mount(&fixture.github)
        .await;

    let result = fixture
        .call("create_github_issue", json!({"title": "x", "assignees": ["ghost"]}))
        .await;

    assert!(result.is_error);
    let text = result.text_content();
    assert!(text.starts_with("Error: "));
    assert!(text.contains("422"));
    assert!(text.contains("Validation Failed"));
}

// =============================================================================
// list_github_issues
// =============================================================================

#[tokio::test]
async fn test_list_issues_defaults() {
    let fixture = TestFixture::new().await;

    let mut pull = issue_json(8, "Add caching", "open");
    pull["pull_request"] = json!({"url": "https://api.github.com/repos/octo/widgets/pulls/8"});

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .and(query_param("state", "open"))
        .and(query_param("per_page", "10"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([issue_json(42, "Bug X", "open"), pull])),
        )
        .expect(1)
        .mount(&fixture.github)
        .await;

    let result = fixture.call("list_github_issues", json!({})).await;

    assert!(!result.is_error);
    let text = result.text_content();
    assert!(text.starts_with("Found 2 open issues in octo/widgets:"));
    assert!(text.contains("#42: Bug X [open] labels: bug"));
    assert!(text.contains("#8: Add caching [open] (pull request)"));
}

#[tokio::test]
async fn test_list_issues_empty() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .and(query_param("state", "closed"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fixture.github)
        .await;

    // Limits above the API maximum are clamped.
    let result = fixture
        .call("list_github_issues", json!({"state": "closed", "limit": 500}))
        .await;

    assert!(!result.is_error);
    assert_eq!(result.text_content(), "No closed issues found in octo/widgets");
}

// =============================================================================
// get_github_issue / add_github_issue_comment
// =============================================================================

#[tokio::test]
async fn test_get_issue() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(42, "Bug X", "open")))
        .expect(1)
        .mount(&fixture.github)
        .await;

    let result = fixture.call("get_github_issue", json!({"issue_number": 42})).await;

    assert!(!result.is_error);
    let text = result.text_content();
    assert!(text.starts_with("Issue #42: Bug X\nState: open\nAuthor: octocat"));
    assert!(text.ends_with("Steps to reproduce"));
}

#[tokio::test]
async fn test_get_issue_not_found() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues/9999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&fixture.github)
        .await;

    let result = fixture.call("get_github_issue", json!({"issue_number": 9999})).await;

    assert!(result.is_error);
    assert!(result.text_content().contains("404"));
}

#[tokio::test]
async fn test_add_comment() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues/42/comments"))
        .and(body_json(json!({"body": "Reproduced on main"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 777,
            "html_url": "https://github.com/octo/widgets/issues/42#issuecomment-777",
            "body": "Reproduced on main"
        })))
        .expect(1)
        .mount(&fixture.github)
        .await;

    let result = fixture
        .call(
            "add_github_issue_comment",
            json!({"issue_number": 42, "body": "Reproduced on main"}),
        )
        .await;

    assert!(!result.is_error);
    assert!(result.text_content().starts_with("Added comment to issue #42"));
}

#[tokio::test]
async fn test_add_comment_server_error() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues/42/comments"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&fixture.github)
        .await;

    let result = fixture
        .call("add_github_issue_comment", json!({"issue_number": 42, "body": "hi"}))
        .await;

    assert!(result.is_error);
    assert!(result.text_content().contains("502"));
}

// =============================================================================
// Dispatcher and health
// =============================================================================

#[tokio::test]
async fn test_unknown_tool() {
    let fixture = TestFixture::new().await;

    let result = fixture.call("delete_github_repo", json!({})).await;

    assert!(result.is_error);
    assert!(result.text_content().contains("delete_github_repo"));
}

#[tokio::test]
async fn test_tools_list_over_json_rpc() {
    let fixture = TestFixture::new().await;

    let request = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
    let first = fixture.server.handle_line(request).await.unwrap();
    let second = fixture.server.handle_line(request).await.unwrap();

    let tools = first.result.unwrap()["tools"].clone();
    assert_eq!(tools.as_array().unwrap().len(), 4);
    assert_eq!(tools[0]["name"], "create_github_issue");
    assert!(tools[0]["inputSchema"].is_object());
    assert_eq!(tools, second.result.unwrap()["tools"]);
}

#[tokio::test]
async fn test_health_endpoint_reports_repository() {
    let github = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "full_name": "octo/widgets",
            "private": true,
            "html_url": "https://github.com/octo/widgets"
        })))
        .mount(&github)
        .await;

    let integration = Arc::new(GithubIntegration::new(&config(&github)).unwrap());
    let server = Arc::new(
        McpServer::new("github-mcp-server", "0.1.0")
            .with_tools(integration.tools())
            .unwrap(),
    );
    let state = Arc::new(HealthState::new(integration, server));
    let endpoint = HealthServer::bind("127.0.0.1:0".parse().unwrap(), health::router(state))
        .await
        .unwrap();

    let response = reqwest::get(format!("http://{}/health", endpoint.addr()))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "github-mcp-server");
    assert_eq!(body["repo"], "octo/widgets");
    assert_eq!(body["repo_full_name"], "octo/widgets");
    assert_eq!(body["private"], true);

    let info: serde_json::Value = reqwest::get(format!("http://{}/info", endpoint.addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["tool_count"], 4);

    endpoint.shutdown().await;
}
