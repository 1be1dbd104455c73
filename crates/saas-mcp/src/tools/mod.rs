//! MCP tool catalogs
//!
//! One module per upstream integration. Each exposes a `*_tools` function
//! returning its fixed catalog, plus the [`Integration`](crate::Integration)
//! that wires the catalog to its probe.

pub mod github;
pub mod merge;
pub mod slack;

pub use github::{github_tools, GithubIntegration};
pub use merge::{merge_tools, MergeIntegration};
pub use slack::{slack_tools, SlackIntegration};
