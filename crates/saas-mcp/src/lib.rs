//! # SaaS MCP
//!
//! This crate provides MCP (Model Context Protocol) gateways that expose
//! third-party SaaS APIs as callable tools for AI assistants.
//!
//! ## Overview
//!
//! Each gateway binary serves one integration:
//! - **github-mcp**: issue tracking on one GitHub repository
//! - **slack-mcp**: messaging in one Slack workspace
//! - **merge-mcp**: accounts, contacts and deals through Merge's unified CRM API
//!
//! All three share the same scaffold: typed upstream clients, a tool
//! registry and dispatcher, a stdio JSON-RPC transport, and a liveness HTTP
//! endpoint.
//!
//! ## MCP Protocol
//!
//! Requests arrive as newline-delimited JSON-RPC 2.0 on stdin and responses
//! leave on stdout. Logs go to stderr.
//!
//! Supported methods:
//! - `initialize`: Initialize the MCP session
//! - `ping`: Liveness check on the protocol channel
//! - `tools/list`: List available tools
//! - `tools/call`: Execute a tool
//!
//! ## Available Tools
//!
//! ### GitHub
//! - `create_github_issue`, `list_github_issues`, `get_github_issue`,
//!   `add_github_issue_comment`
//!
//! ### Slack
//! - `slack_list_channels`, `slack_post_message`, `slack_reply_to_thread`,
//!   `slack_add_reaction`, `slack_get_channel_history`,
//!   `slack_get_thread_replies`, `slack_get_users`, `slack_get_user_profile`
//!
//! ### Merge CRM
//! - `get_crm_accounts`, `search_crm_contacts`, `create_crm_contact`,
//!   `create_crm_opportunity`, `list_crm_opportunities`
//!
//! ## Usage
//!
//! ### Handling MCP Requests
//!
//! ```rust,no_run
//! use saas_mcp::clients::GithubConfig;
//! use saas_mcp::{GithubIntegration, Integration, McpServer};
//!
//! async fn handle(json: &str) {
//!     let integration = GithubIntegration::new(&GithubConfig::from_env().unwrap()).unwrap();
//!     let server = McpServer::new("github-mcp-server", "0.1.0")
//!         .with_tools(integration.tools())
//!         .unwrap();
//!
//!     if let Some(response) = server.handle_line(json).await {
//!         println!("{}", serde_json::to_string(&response).unwrap());
//!     }
//! }
//! ```
//!
//! ### Running a Gateway
//!
//! ```rust,no_run
//! use saas_mcp::{launch, SlackIntegration};
//! use std::process::ExitCode;
//!
//! fn main() -> ExitCode {
//!     launch::<SlackIntegration>()
//! }
//! ```

pub mod clients;
pub mod gateway;
pub mod health;
pub mod integration;
pub mod server;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export main types
pub use gateway::{
    bootstrap, init_tracing, launch, shutdown_signal, Gateway, GatewayError, GatewayState,
};
pub use integration::Integration;
pub use server::{parse_args, McpServer, McpServerError, McpServerResult, Tool, ToolContext};
pub use types::{
    ContentBlock, McpError, McpRequest, McpResponse, RequestId, ServerCapabilities, ServerInfo,
    ToolCall, ToolCapabilities, ToolDefinition, ToolResult, PROTOCOL_VERSION,
};

// Re-export tool collections
pub use tools::{
    github_tools, merge_tools, slack_tools, GithubIntegration, MergeIntegration, SlackIntegration,
};

// Re-export service clients
pub use clients::{GithubClient, MergeClient, SlackClient, UpstreamError};

// Re-export health check types
pub use health::{HealthReport, HealthServer, HealthStatus, ServiceInfo};
