//! Slack service client.
//!
//! Typed facade over the Slack Web API. Slack reports most failures as
//! HTTP 200 with `{"ok": false, "error": "..."}`; those are surfaced as
//! [`UpstreamError::Api`] carrying the raw body so the Slack error code
//! reaches the caller.

use super::config::SlackConfig;
use super::upstream::{UpstreamClient, UpstreamError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Slack service client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    /// Authenticated upstream client.
    upstream: UpstreamClient,

    /// Workspace ID.
    team_id: String,

    /// Configured channel allow-list.
    channel_ids: Vec<String>,
}

impl SlackClient {
    /// Create a new Slack client.
    pub fn new(config: &SlackConfig) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::builder("Slack", config.api_url.clone())
            .bearer(&config.bot_token)
            .build()?;

        Ok(Self {
            upstream,
            team_id: config.team_id.clone(),
            channel_ids: config.channel_ids.clone(),
        })
    }

    /// Workspace ID.
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Identify the bot; doubles as the connectivity probe.
    #[instrument(skip(self))]
    pub async fn auth_test(&self) -> Result<AuthTest, UpstreamError> {
        let value = self.upstream.post("/auth.test", &serde_json::json!({})).await?;
        self.decode(value)
    }

    /// List public channels, or the configured allow-list when present.
    #[instrument(skip(self))]
    pub async fn list_channels(
        &self,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ChannelPage, UpstreamError> {
        if !self.channel_ids.is_empty() {
            debug!(count = self.channel_ids.len(), "Listing configured channels");
            let mut channels = Vec::with_capacity(self.channel_ids.len());
            for id in self.channel_ids.iter().take(limit as usize) {
                let value = self
                    .upstream
                    .get("/conversations.info", &[("channel", id.clone())])
                    .await?;
                let info: ChannelInfo = self.decode(value)?;
                channels.push(info.channel);
            }
            return Ok(ChannelPage {
                channels,
                response_metadata: None,
            });
        }

        let mut query = vec![
            ("types", "public_channel".to_string()),
            ("exclude_archived", "true".to_string()),
            ("limit", limit.to_string()),
            ("team_id", self.team_id.clone()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let value = self.upstream.get("/conversations.list", &query).await?;
        self.decode(value)
    }

    /// Post a message, optionally as a thread reply.
    #[instrument(skip(self, text))]
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, UpstreamError> {
        let mut body = serde_json::json!({ "channel": channel, "text": text });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let value = self.upstream.post("/chat.postMessage", &body).await?;
        self.decode(value)
    }

    /// Add an emoji reaction to a message.
    #[instrument(skip(self))]
    pub async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        reaction: &str,
    ) -> Result<(), UpstreamError> {
        let value = self
            .upstream
            .post(
                "/reactions.add",
                &serde_json::json!({
                    "channel": channel,
                    "timestamp": timestamp,
                    "name": reaction.trim_matches(':'),
                }),
            )
            .await?;
        self.check(value).map(|_| ())
    }

    /// Recent messages in a channel.
    #[instrument(skip(self))]
    pub async fn channel_history(&self, channel: &str, limit: u32) -> Result<Messages, UpstreamError> {
        let value = self
            .upstream
            .get(
                "/conversations.history",
                &[("channel", channel.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        self.decode(value)
    }

    /// All replies in a thread, parent first.
    #[instrument(skip(self))]
    pub async fn thread_replies(&self, channel: &str, thread_ts: &str) -> Result<Messages, UpstreamError> {
        let value = self
            .upstream
            .get(
                "/conversations.replies",
                &[("channel", channel.to_string()), ("ts", thread_ts.to_string())],
            )
            .await?;
        self.decode(value)
    }

    /// Workspace members.
    #[instrument(skip(self))]
    pub async fn list_users(&self, limit: u32, cursor: Option<&str>) -> Result<UserPage, UpstreamError> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("team_id", self.team_id.clone()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let value = self.upstream.get("/users.list", &query).await?;
        self.decode(value)
    }

    /// Profile of one user.
    #[instrument(skip(self))]
    pub async fn user_profile(&self, user_id: &str) -> Result<UserProfile, UpstreamError> {
        let value = self
            .upstream
            .get(
                "/users.profile.get",
                &[("user", user_id.to_string()), ("include_labels", "true".to_string())],
            )
            .await?;
        let envelope: ProfileEnvelope = self.decode(value)?;
        Ok(envelope.profile)
    }

    /// Reject `{"ok": false}` bodies.
    fn check(&self, value: Value) -> Result<Value, UpstreamError> {
        if value.get("ok").and_then(Value::as_bool) == Some(false) {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            warn!(error = code, "Slack API rejected the call");
            return Err(UpstreamError::Api {
                service: self.upstream.service(),
                status: 200,
                body: value.to_string(),
            });
        }
        Ok(value)
    }

    fn decode<T>(&self, value: Value) -> Result<T, UpstreamError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.check(value)?;
        self.upstream.decode(value)
    }
}

/// `auth.test` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTest {
    /// Workspace name.
    #[serde(default)]
    pub team: Option<String>,

    /// Workspace ID.
    #[serde(default)]
    pub team_id: Option<String>,

    /// Bot user name.
    #[serde(default)]
    pub user: Option<String>,

    /// Bot user ID.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Free-text channel attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextValue {
    /// Text.
    #[serde(default)]
    pub value: String,
}

/// A conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel ID.
    pub id: String,

    /// Channel name without `#`.
    #[serde(default)]
    pub name: Option<String>,

    /// Member count.
    #[serde(default)]
    pub num_members: Option<u64>,

    /// Topic.
    #[serde(default)]
    pub topic: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    channel: Channel,
}

/// Cursor metadata on paged responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Cursor for the next page; empty when exhausted.
    #[serde(default)]
    pub next_cursor: String,
}

/// A page of channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPage {
    /// Channels.
    #[serde(default)]
    pub channels: Vec<Channel>,

    /// Paging metadata.
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

impl ChannelPage {
    /// Cursor for the next page, if any.
    pub fn next_cursor(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .map(|m| m.next_cursor.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// `chat.postMessage` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedMessage {
    /// Channel the message landed in.
    pub channel: String,

    /// Message timestamp (its ID).
    pub ts: String,
}

/// A message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author user ID.
    #[serde(default)]
    pub user: Option<String>,

    /// Text.
    #[serde(default)]
    pub text: String,

    /// Timestamp.
    pub ts: String,

    /// Parent thread timestamp.
    #[serde(default)]
    pub thread_ts: Option<String>,

    /// Reply count on thread parents.
    #[serde(default)]
    pub reply_count: Option<u64>,
}

/// A list of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messages {
    /// Messages.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Whether older messages exist.
    #[serde(default)]
    pub has_more: bool,
}

/// A workspace member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// User ID.
    pub id: String,

    /// Handle.
    #[serde(default)]
    pub name: Option<String>,

    /// Full name.
    #[serde(default)]
    pub real_name: Option<String>,

    /// Deactivated.
    #[serde(default)]
    pub deleted: bool,

    /// Bot user.
    #[serde(default)]
    pub is_bot: bool,
}

/// A page of members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPage {
    /// Members.
    #[serde(default)]
    pub members: Vec<Member>,

    /// Paging metadata.
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

impl UserPage {
    /// Cursor for the next page, if any.
    pub fn next_cursor(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .map(|m| m.next_cursor.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// A user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Full name.
    #[serde(default)]
    pub real_name: Option<String>,

    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Email (requires `users:read.email`).
    #[serde(default)]
    pub email: Option<String>,

    /// Job title.
    #[serde(default)]
    pub title: Option<String>,

    /// Status text.
    #[serde(default)]
    pub status_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    profile: UserProfile,
}
