//! The seam between the shared gateway scaffold and one upstream.

use crate::clients::UpstreamError;
use crate::gateway::GatewayError;
use crate::server::Tool;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One upstream integration: its catalog and its connectivity probe.
#[async_trait]
pub trait Integration: Send + Sync + 'static {
    /// Service name reported in `serverInfo`, `/health` and `/info`.
    const SERVICE: &'static str;

    /// Health port used when `HEALTH_PORT` is unset.
    const DEFAULT_PORT: u16;

    /// Load credentials from the environment and build the clients.
    fn from_env() -> Result<Self, GatewayError>
    where
        Self: Sized;

    /// One-line description for `/info`.
    fn description(&self) -> &'static str;

    /// The tool catalog, in advertised order.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;

    /// Call one cheap authenticated endpoint.
    ///
    /// Returns the integration-specific fields reported by `/health`.
    async fn probe(&self) -> Result<Map<String, Value>, UpstreamError>;
}
