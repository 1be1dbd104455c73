//! Slack MCP tools
//!
//! Messaging tools for one Slack workspace. Every tool shares one
//! [`SlackClient`]; Slack `{"ok": false}` rejections surface as upstream
//! errors carrying the Slack error code.

use crate::clients::config::SlackConfig;
use crate::clients::slack::{Channel, Message, SlackClient};
use crate::clients::UpstreamError;
use crate::gateway::GatewayError;
use crate::integration::Integration;
use crate::server::{parse_args, McpServerResult, Tool, ToolContext};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Page size cap for channel and user listings.
const MAX_PAGE: u32 = 200;

/// Cap for channel history.
const MAX_HISTORY: u32 = 1000;

/// Tool to list channels.
pub struct ListChannelsTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for ListChannelsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "slack_list_channels",
            "List public channels in the workspace (or the configured channel allow-list)",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_PAGE,
                    "description": "Maximum number of channels to return",
                    "default": 100
                },
                "cursor": {
                    "type": "string",
                    "description": "Pagination cursor from a previous call"
                }
            },
            "required": []
        }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_list_channels", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: PageParams = parse_args(args)?;
        let page = self
            .client
            .list_channels(params.limit.clamp(1, MAX_PAGE), params.cursor.as_deref())
            .await?;
        debug!(count = page.channels.len(), "Listed Slack channels");

        if page.channels.is_empty() {
            return Ok(ToolResult::text("No channels found."));
        }

        let mut text = format!("Found {} channels:\n", page.channels.len());
        for channel in &page.channels {
            text.push('\n');
            text.push_str(&channel_line(channel));
        }
        push_cursor(&mut text, page.next_cursor());
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct PageParams {
    #[serde(default = "default_page")]
    limit: u32,
    #[serde(default)]
    cursor: Option<String>,
}

fn default_page() -> u32 {
    100
}

/// Tool to post a message.
pub struct PostMessageTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for PostMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_post_message", "Post a new message to a Slack channel")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "ID of the channel to post to"
                    },
                    "text": {
                        "type": "string",
                        "description": "Message text"
                    }
                },
                "required": ["channel_id", "text"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_post_message", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: PostMessageParams = parse_args(args)?;
        let posted = self
            .client
            .post_message(&params.channel_id, &params.text, None)
            .await?;
        info!(channel = %posted.channel, ts = %posted.ts, "Posted Slack message");

        Ok(ToolResult::text(format!(
            "Message posted to {}\nTimestamp: {}",
            posted.channel, posted.ts
        )))
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageParams {
    channel_id: String,
    text: String,
}

/// Tool to reply in a thread.
pub struct ReplyToThreadTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for ReplyToThreadTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_reply_to_thread", "Reply to a message thread in a Slack channel")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "ID of the channel containing the thread"
                    },
                    "thread_ts": {
                        "type": "string",
                        "description": "Timestamp of the parent message (e.g. '1234567890.123456')"
                    },
                    "text": {
                        "type": "string",
                        "description": "Reply text"
                    }
                },
                "required": ["channel_id", "thread_ts", "text"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_reply_to_thread", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ReplyParams = parse_args(args)?;
        let posted = self
            .client
            .post_message(&params.channel_id, &params.text, Some(&params.thread_ts))
            .await?;

        Ok(ToolResult::text(format!(
            "Reply posted to thread {} in {}\nTimestamp: {}",
            params.thread_ts, posted.channel, posted.ts
        )))
    }
}

#[derive(Debug, Deserialize)]
struct ReplyParams {
    channel_id: String,
    thread_ts: String,
    text: String,
}

/// Tool to react to a message.
pub struct AddReactionTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for AddReactionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_add_reaction", "Add an emoji reaction to a message")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "ID of the channel containing the message"
                    },
                    "timestamp": {
                        "type": "string",
                        "description": "Timestamp of the message to react to"
                    },
                    "reaction": {
                        "type": "string",
                        "description": "Emoji name without colons (e.g. 'thumbsup')"
                    }
                },
                "required": ["channel_id", "timestamp", "reaction"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_add_reaction", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ReactionParams = parse_args(args)?;
        self.client
            .add_reaction(&params.channel_id, &params.timestamp, &params.reaction)
            .await?;

        Ok(ToolResult::text(format!(
            "Added reaction :{}: to message {} in {}",
            params.reaction.trim_matches(':'),
            params.timestamp,
            params.channel_id
        )))
    }
}

#[derive(Debug, Deserialize)]
struct ReactionParams {
    channel_id: String,
    timestamp: String,
    reaction: String,
}

/// Tool to read recent channel messages.
pub struct ChannelHistoryTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for ChannelHistoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_get_channel_history", "Get recent messages from a channel")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "ID of the channel"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of messages to retrieve",
                        "default": 10
                    }
                },
                "required": ["channel_id"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_get_channel_history", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: HistoryParams = parse_args(args)?;
        let history = self
            .client
            .channel_history(&params.channel_id, params.limit.clamp(1, MAX_HISTORY))
            .await?;

        if history.messages.is_empty() {
            return Ok(ToolResult::text(format!(
                "No messages found in {}",
                params.channel_id
            )));
        }

        let mut text = format!(
            "Last {} messages in {}:\n",
            history.messages.len(),
            params.channel_id
        );
        for message in &history.messages {
            text.push('\n');
            text.push_str(&message_line(message));
        }
        if history.has_more {
            text.push_str("\n\nOlder messages available.");
        }
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    channel_id: String,
    #[serde(default = "default_history")]
    limit: u32,
}

fn default_history() -> u32 {
    10
}

/// Tool to read a thread.
pub struct ThreadRepliesTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for ThreadRepliesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_get_thread_replies", "Get all replies in a message thread")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "ID of the channel containing the thread"
                    },
                    "thread_ts": {
                        "type": "string",
                        "description": "Timestamp of the parent message"
                    }
                },
                "required": ["channel_id", "thread_ts"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_get_thread_replies", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: ThreadParams = parse_args(args)?;
        let thread = self
            .client
            .thread_replies(&params.channel_id, &params.thread_ts)
            .await?;

        let mut text = format!(
            "Thread {} in {} ({} messages):\n",
            params.thread_ts,
            params.channel_id,
            thread.messages.len()
        );
        for message in &thread.messages {
            text.push('\n');
            text.push_str(&message_line(message));
        }
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct ThreadParams {
    channel_id: String,
    thread_ts: String,
}

/// Tool to list workspace members.
pub struct GetUsersTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for GetUsersTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_get_users", "List users in the workspace with basic profile information")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_PAGE,
                        "description": "Maximum number of users to return",
                        "default": 100
                    },
                    "cursor": {
                        "type": "string",
                        "description": "Pagination cursor from a previous call"
                    }
                },
                "required": []
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_get_users", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: PageParams = parse_args(args)?;
        let page = self
            .client
            .list_users(params.limit.clamp(1, MAX_PAGE), params.cursor.as_deref())
            .await?;

        if page.members.is_empty() {
            return Ok(ToolResult::text("No users found."));
        }

        let mut text = format!("Found {} users:\n", page.members.len());
        for member in &page.members {
            text.push_str(&format!(
                "\n{} ({})",
                member.name.as_deref().unwrap_or("unknown"),
                member.id
            ));
            if let Some(real_name) = member.real_name.as_deref().filter(|n| !n.is_empty()) {
                text.push_str(&format!(" - {}", real_name));
            }
            if member.is_bot {
                text.push_str(" [bot]");
            }
            if member.deleted {
                text.push_str(" [deactivated]");
            }
        }
        push_cursor(&mut text, page.next_cursor());
        Ok(ToolResult::text(text))
    }
}

/// Tool to read one user profile.
pub struct GetUserProfileTool {
    client: Arc<SlackClient>,
}

#[async_trait]
impl Tool for GetUserProfileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack_get_user_profile", "Get detailed profile information for a user")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "ID of the user"
                    }
                },
                "required": ["user_id"]
            }))
    }

    #[instrument(skip(self, args, context), fields(tool = "slack_get_user_profile", correlation_id = %context.correlation_id))]
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult> {
        let params: UserParams = parse_args(args)?;
        let profile = self.client.user_profile(&params.user_id).await?;

        let mut text = format!("Profile for {}:", params.user_id);
        let fields = [
            ("Name", &profile.real_name),
            ("Display name", &profile.display_name),
            ("Email", &profile.email),
            ("Title", &profile.title),
            ("Status", &profile.status_text),
        ];
        for (label, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                text.push_str(&format!("\n{}: {}", label, value));
            }
        }
        Ok(ToolResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct UserParams {
    user_id: String,
}

fn channel_line(channel: &Channel) -> String {
    let mut line = format!(
        "#{} ({})",
        channel.name.as_deref().unwrap_or("unnamed"),
        channel.id
    );
    if let Some(members) = channel.num_members {
        line.push_str(&format!(" - {} members", members));
    }
    let topic = channel
        .topic
        .as_ref()
        .map(|t| t.value.as_str())
        .filter(|t| !t.is_empty());
    if let Some(topic) = topic {
        line.push_str(&format!("\n  Topic: {}", topic));
    }
    line
}

fn message_line(message: &Message) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        message.ts,
        message.user.as_deref().unwrap_or("unknown"),
        message.text
    );
    if let Some(replies) = message.reply_count.filter(|&n| n > 0) {
        line.push_str(&format!(" ({} replies)", replies));
    }
    line
}

fn push_cursor(text: &mut String, cursor: Option<&str>) {
    if let Some(cursor) = cursor {
        text.push_str(&format!("\n\nMore results available (cursor: {})", cursor));
    }
}

/// Get all Slack tools.
pub fn slack_tools(client: Arc<SlackClient>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListChannelsTool { client: Arc::clone(&client) }),
        Arc::new(PostMessageTool { client: Arc::clone(&client) }),
        Arc::new(ReplyToThreadTool { client: Arc::clone(&client) }),
        Arc::new(AddReactionTool { client: Arc::clone(&client) }),
        Arc::new(ChannelHistoryTool { client: Arc::clone(&client) }),
        Arc::new(ThreadRepliesTool { client: Arc::clone(&client) }),
        Arc::new(GetUsersTool { client: Arc::clone(&client) }),
        Arc::new(GetUserProfileTool { client }),
    ]
}

/// The Slack gateway integration.
pub struct SlackIntegration {
    client: Arc<SlackClient>,
}

impl SlackIntegration {
    /// Build the integration from explicit configuration.
    pub fn new(config: &SlackConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: Arc::new(SlackClient::new(config)?),
        })
    }
}

#[async_trait]
impl Integration for SlackIntegration {
    const SERVICE: &'static str = "slack-mcp-server";
    const DEFAULT_PORT: u16 = 8003;

    fn from_env() -> Result<Self, GatewayError> {
        let config = SlackConfig::from_env()?;
        info!(
            team_id = %config.team_id,
            channels = config.channel_ids.len(),
            token = %config.bot_token.masked(),
            "Loaded Slack configuration"
        );
        Self::new(&config).map_err(GatewayError::Setup)
    }

    fn description(&self) -> &'static str {
        "Slack messaging tools over MCP"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        slack_tools(Arc::clone(&self.client))
    }

    async fn probe(&self) -> Result<Map<String, Value>, UpstreamError> {
        let auth = self.client.auth_test().await?;

        let mut fields = Map::new();
        fields.insert(
            "team_id".to_string(),
            Value::from(auth.team_id.unwrap_or_else(|| self.client.team_id().to_string())),
        );
        fields.insert("team".to_string(), auth.team.map(Value::from).unwrap_or(Value::Null));
        fields.insert("bot_user".to_string(), auth.user.map(Value::from).unwrap_or(Value::Null));
        Ok(fields)
    }
}
