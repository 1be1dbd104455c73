//! Upstream service clients.
//!
//! This module provides one typed HTTP client per upstream integration:
//! - GitHub: issues on a single repository
//! - Slack: channels, messages, reactions and users of one workspace
//! - Merge: accounts, contacts and opportunities of one linked CRM account
//!
//! Each client wraps a shared [`UpstreamClient`] that injects credentials and
//! normalizes upstream failures into [`UpstreamError`].

pub mod config;
pub mod github;
pub mod merge;
pub mod slack;
pub mod upstream;

pub use config::{ConfigError, GatewaySettings, GithubConfig, MergeConfig, Secret, SlackConfig};
pub use github::GithubClient;
pub use merge::MergeClient;
pub use slack::SlackClient;
pub use upstream::{UpstreamClient, UpstreamError};
