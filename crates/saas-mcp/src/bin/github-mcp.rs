//! GitHub MCP gateway.

use saas_mcp::{launch, GithubIntegration};
use std::process::ExitCode;

fn main() -> ExitCode {
    launch::<GithubIntegration>()
}
