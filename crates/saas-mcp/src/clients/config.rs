//! Upstream and gateway configuration.
//!
//! Every integration loads its credentials once at startup from environment
//! variables. Loading goes through a lookup function so the same code path
//! can be exercised in tests without touching the process environment.

use std::fmt;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// A credential that must never be logged in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building auth headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A log-safe rendering showing at most the first four characters.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}****", prefix)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Read a required variable; empty values count as missing.
fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Process-level settings shared by every gateway binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Port for the liveness HTTP endpoint.
    pub health_port: u16,

    /// Log filter directive (e.g. "info", "saas_mcp=debug").
    pub log_level: String,
}

impl GatewaySettings {
    /// Load settings from the environment.
    ///
    /// Environment variables:
    /// - `HEALTH_PORT`: liveness endpoint port (default: `default_port`)
    /// - `LOG_LEVEL`: log filter (default: info)
    pub fn from_env(default_port: u16) -> Result<Self, ConfigError> {
        Self::from_lookup(default_port, env_lookup)
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(default_port: u16, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let health_port = match optional(&lookup, "HEALTH_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "HEALTH_PORT".to_string(),
                message: format!("expected a port number, got '{}'", raw),
            })?,
            None => default_port,
        };

        Ok(Self {
            health_port,
            log_level: optional(&lookup, "LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// GitHub integration configuration.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Base URL of the GitHub REST API.
    pub api_url: String,

    /// Personal access or app token.
    pub token: Secret,

    /// Target repository as `owner/name`.
    pub repo: String,
}

impl GithubConfig {
    /// Default GitHub API base URL.
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GITHUB_TOKEN` (required)
    /// - `GITHUB_REPO` (required, `owner/name`)
    /// - `GITHUB_API_URL` (default: https://api.github.com)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = required(&lookup, "GITHUB_TOKEN")?;
        let repo = required(&lookup, "GITHUB_REPO")?;

        let valid_repo = matches!(
            repo.split_once('/'),
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/')
        );
        if !valid_repo {
            return Err(ConfigError::InvalidValue {
                key: "GITHUB_REPO".to_string(),
                message: format!("expected 'owner/name', got '{}'", repo),
            });
        }

        Ok(Self {
            api_url: optional(&lookup, "GITHUB_API_URL")
                .unwrap_or_else(|| Self::DEFAULT_API_URL.to_string()),
            token: Secret::new(token),
            repo,
        })
    }
}

/// Slack integration configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Base URL of the Slack Web API.
    pub api_url: String,

    /// Bot user OAuth token (`xoxb-...`).
    pub bot_token: Secret,

    /// Workspace (team) ID.
    pub team_id: String,

    /// Optional allow-list of channel IDs for channel listing.
    pub channel_ids: Vec<String>,
}

impl SlackConfig {
    /// Default Slack Web API base URL.
    pub const DEFAULT_API_URL: &'static str = "https://slack.com/api";

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SLACK_BOT_TOKEN` (required)
    /// - `SLACK_TEAM_ID` (required)
    /// - `SLACK_CHANNEL_IDS` (optional, comma-separated)
    /// - `SLACK_API_URL` (default: https://slack.com/api)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = required(&lookup, "SLACK_BOT_TOKEN")?;
        let team_id = required(&lookup, "SLACK_TEAM_ID")?;
        let channel_ids = optional(&lookup, "SLACK_CHANNEL_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_url: optional(&lookup, "SLACK_API_URL")
                .unwrap_or_else(|| Self::DEFAULT_API_URL.to_string()),
            bot_token: Secret::new(bot_token),
            team_id,
            channel_ids,
        })
    }
}

/// Merge unified CRM integration configuration.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Base URL of the Merge CRM API.
    pub api_url: String,

    /// Merge production API key.
    pub api_key: Secret,

    /// Linked account token scoping every request.
    pub account_token: Secret,
}

impl MergeConfig {
    /// Default Merge CRM API base URL.
    pub const DEFAULT_API_URL: &'static str = "https://api.merge.dev/api/crm/v1";

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MERGE_API_KEY` (required)
    /// - `MERGE_ACCOUNT_TOKEN` (required)
    /// - `MERGE_API_URL` (default: https://api.merge.dev/api/crm/v1)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "MERGE_API_KEY")?;
        let account_token = required(&lookup, "MERGE_ACCOUNT_TOKEN")?;

        Ok(Self {
            api_url: optional(&lookup, "MERGE_API_URL")
                .unwrap_or_else(|| Self::DEFAULT_API_URL.to_string()),
            api_key: Secret::new(api_key),
            account_token: Secret::new(account_token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("ghp_abcdefghijklmnop");
        assert_eq!(format!("{:?}", secret), "Secret(****)");
        assert_eq!(secret.masked(), "ghp_****");
        assert_eq!(secret.expose(), "ghp_abcdefghijklmnop");
    }

    #[test]
    fn test_gateway_settings_defaults() {
        let settings = GatewaySettings::from_lookup(8001, vars(&[])).unwrap();
        assert_eq!(settings.health_port, 8001);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_gateway_settings_invalid_port() {
        let err = GatewaySettings::from_lookup(8001, vars(&[("HEALTH_PORT", "http")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue { ref key, .. }) if key == "HEALTH_PORT"));
    }

    #[test]
    fn test_github_config() {
        let config = GithubConfig::from_lookup(vars(&[
            ("GITHUB_TOKEN", "ghp_test"),
            ("GITHUB_REPO", "octo/widgets"),
        ]))
        .unwrap();
        assert_eq!(config.repo, "octo/widgets");
        assert_eq!(config.api_url, GithubConfig::DEFAULT_API_URL);
    }

    #[test]
    fn test_github_config_missing_token() {
        let err = GithubConfig::from_lookup(vars(&[("GITHUB_REPO", "octo/widgets")]));
        assert!(matches!(err, Err(ConfigError::MissingEnvVar(ref key)) if key == "GITHUB_TOKEN"));
    }

    #[test]
    fn test_github_config_empty_value_is_missing() {
        let err = GithubConfig::from_lookup(vars(&[
            ("GITHUB_TOKEN", "ghp_test"),
            ("GITHUB_REPO", "  "),
        ]));
        assert!(matches!(err, Err(ConfigError::MissingEnvVar(ref key)) if key == "GITHUB_REPO"));
    }

    #[test]
    fn test_github_config_rejects_malformed_repo() {
        for repo in ["widgets", "octo/", "/widgets", "octo/widgets/extra"] {
            let err = GithubConfig::from_lookup(vars(&[
                ("GITHUB_TOKEN", "ghp_test"),
                ("GITHUB_REPO", repo),
            ]));
            assert!(
                matches!(err, Err(ConfigError::InvalidValue { .. })),
                "repo '{}' should be rejected",
                repo
            );
        }
    }

    #[test]
    fn test_slack_config_channel_ids() {
        let config = SlackConfig::from_lookup(vars(&[
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("SLACK_TEAM_ID", "T123"),
            ("SLACK_CHANNEL_IDS", "C1, C2,,C3 "),
        ]))
        .unwrap();
        assert_eq!(config.channel_ids, vec!["C1", "C2", "C3"]);
    }

    #[test]
    fn test_slack_config_missing_team() {
        let err = SlackConfig::from_lookup(vars(&[("SLACK_BOT_TOKEN", "xoxb-1")]));
        assert!(matches!(err, Err(ConfigError::MissingEnvVar(ref key)) if key == "SLACK_TEAM_ID"));
    }

    #[test]
    fn test_merge_config_requires_both_tokens() {
        let err = MergeConfig::from_lookup(vars(&[("MERGE_API_KEY", "key")]));
        assert!(
            matches!(err, Err(ConfigError::MissingEnvVar(ref key)) if key == "MERGE_ACCOUNT_TOKEN")
        );

        let config = MergeConfig::from_lookup(vars(&[
            ("MERGE_API_KEY", "key"),
            ("MERGE_ACCOUNT_TOKEN", "acct"),
            ("MERGE_API_URL", "http://localhost:9000"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9000");
    }
}
