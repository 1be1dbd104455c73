//! Merge CRM MCP gateway.

use saas_mcp::{launch, MergeIntegration};
use std::process::ExitCode;

fn main() -> ExitCode {
    launch::<MergeIntegration>()
}
