//! Slack MCP gateway.

use saas_mcp::{launch, SlackIntegration};
use std::process::ExitCode;

fn main() -> ExitCode {
    launch::<SlackIntegration>()
}
