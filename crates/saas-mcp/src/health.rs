//! Liveness HTTP endpoint.
//!
//! Runs beside the stdio channel so orchestrators can check a gateway
//! without speaking MCP:
//!
//! - `GET /health`: probes the upstream on demand (200 or 503)
//! - `GET /info`: static metadata, no upstream call
//! - `GET /tools`: the tool catalog

use crate::gateway::GatewayError;
use crate::integration::Integration;
use crate::server::McpServer;
use crate::types::{ToolDefinition, PROTOCOL_VERSION};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Upstream reachable and credentials accepted.
    Healthy,
    /// Probe failed.
    Unhealthy,
}

/// `/health` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,

    /// Service name (healthy reports only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Integration-specific probe fields.
    #[serde(flatten)]
    pub details: Map<String, Value>,

    /// Probe failure (unhealthy reports only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Timestamp of the check (RFC 3339).
    pub timestamp: String,
}

impl HealthReport {
    /// A passing report.
    pub fn healthy(service: &str, details: Map<String, Value>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            service: Some(service.to_string()),
            details,
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// A failing report.
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            service: None,
            details: Map::new(),
            error: Some(error.into()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether the probe passed.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// `/info` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub protocol: String,
    pub protocol_version: String,
    pub transport: String,
    pub tool_count: usize,
}

/// Shared state behind the endpoint.
pub struct HealthState<I> {
    integration: Arc<I>,
    server: Arc<McpServer>,
}

impl<I: Integration> HealthState<I> {
    /// Create endpoint state.
    pub fn new(integration: Arc<I>, server: Arc<McpServer>) -> Self {
        Self {
            integration,
            server,
        }
    }

    /// Probe the upstream and build a report.
    pub async fn check(&self) -> HealthReport {
        match self.integration.probe().await {
            Ok(details) => HealthReport::healthy(I::SERVICE, details),
            Err(e) => {
                warn!(service = I::SERVICE, error = %e, "Health probe failed");
                HealthReport::unhealthy(e.to_string())
            }
        }
    }

    /// Static service metadata.
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.server.info().name.clone(),
            version: self.server.info().version.clone(),
            description: self.integration.description().to_string(),
            protocol: "mcp".to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            transport: "stdio".to_string(),
            tool_count: self.server.tool_count(),
        }
    }
}

/// Build the endpoint router.
pub fn router<I: Integration>(state: Arc<HealthState<I>>) -> Router {
    Router::new()
        .route("/health", get(health::<I>))
        .route("/info", get(info::<I>))
        .route("/tools", get(tools::<I>))
        .with_state(state)
}

async fn health<I: Integration>(
    State(state): State<Arc<HealthState<I>>>,
) -> (StatusCode, Json<HealthReport>) {
    debug!("Health check requested");
    let report = state.check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn info<I: Integration>(State(state): State<Arc<HealthState<I>>>) -> Json<ServiceInfo> {
    Json(state.info())
}

#[derive(Serialize)]
struct ToolList {
    tools: Vec<ToolDefinition>,
}

async fn tools<I: Integration>(State(state): State<Arc<HealthState<I>>>) -> Json<ToolList> {
    Json(ToolList {
        tools: state.server.list_tools(),
    })
}

/// A running endpoint.
pub struct HealthServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HealthServer {
    /// Bind `addr` and start serving `app` in the background.
    pub async fn bind(addr: SocketAddr, app: Router) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Health endpoint failed");
            }
        });

        info!(%addr, "Health endpoint listening");
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Bound address (resolves port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!(addr = %self.addr, "Health endpoint stopped");
    }
}

impl Drop for HealthServer {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::UpstreamError;
    use crate::server::Tool;
    use async_trait::async_trait;

    struct StubIntegration {
        healthy: bool,
    }

    #[async_trait]
    impl Integration for StubIntegration {
        const SERVICE: &'static str = "stub-mcp-server";
        const DEFAULT_PORT: u16 = 0;

        fn from_env() -> Result<Self, GatewayError> {
            Ok(Self { healthy: true })
        }

        fn description(&self) -> &'static str {
            "Stub integration"
        }

        fn tools(&self) -> Vec<Arc<dyn Tool>> {
            Vec::new()
        }

        async fn probe(&self) -> Result<Map<String, Value>, UpstreamError> {
            if self.healthy {
                let mut fields = Map::new();
                fields.insert("account".to_string(), Value::from("acme"));
                Ok(fields)
            } else {
                Err(UpstreamError::Api {
                    service: "Stub",
                    status: 401,
                    body: "bad credentials".to_string(),
                })
            }
        }
    }

    async fn start(healthy: bool) -> HealthServer {
        let state = Arc::new(HealthState::new(
            Arc::new(StubIntegration { healthy }),
            Arc::new(McpServer::new("stub-mcp-server", "0.1.0")),
        ));
        HealthServer::bind("127.0.0.1:0".parse().unwrap(), router(state))
            .await
            .unwrap()
    }

    #[test]
    fn test_report_wire_format() {
        let mut details = Map::new();
        details.insert("repo".to_string(), Value::from("octo/widgets"));
        let value = serde_json::to_value(HealthReport::healthy("github-mcp-server", details)).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["repo"], "octo/widgets");
        assert!(value.get("error").is_none());

        let value = serde_json::to_value(HealthReport::unhealthy("boom")).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["error"], "boom");
        assert!(value.get("service").is_none());
    }

    #[tokio::test]
    async fn test_health_ok() {
        let server = start(true).await;
        let response = reqwest::get(format!("http://{}/health", server.addr()))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "stub-mcp-server");
        assert_eq!(body["account"], "acme");
        assert!(body["timestamp"].is_string());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_health_unavailable() {
        let server = start(false).await;
        let response = reqwest::get(format!("http://{}/health", server.addr()))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 503);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "unhealthy");
        assert!(body["error"].as_str().unwrap().contains("401"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_info_and_tools() {
        let server = start(true).await;
        let info: Value = reqwest::get(format!("http://{}/info", server.addr()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(info["protocol"], "mcp");
        assert_eq!(info["transport"], "stdio");
        assert_eq!(info["protocol_version"], PROTOCOL_VERSION);
        assert_eq!(info["tool_count"], 0);

        let tools: Value = reqwest::get(format!("http://{}/tools", server.addr()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tools["tools"], serde_json::json!([]));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = start(true).await;
        let state = Arc::new(HealthState::new(
            Arc::new(StubIntegration { healthy: true }),
            Arc::new(McpServer::new("stub-mcp-server", "0.1.0")),
        ));
        let result = HealthServer::bind(first.addr(), router(state)).await;
        assert!(matches!(result, Err(GatewayError::Bind { .. })));
        first.shutdown().await;
    }
}
