//! MCP server implementation
//!
//! This module provides the tool registry and JSON-RPC dispatcher shared by
//! every gateway. The registry is built once at startup and is read-only
//! afterwards, so a server can be shared across request tasks behind an
//! `Arc` without locking.

use crate::clients::UpstreamError;
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// MCP server error types.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Upstream API call failed
    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    /// Tool execution failed
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    /// Two tools share a name
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// Result type for MCP server operations.
pub type McpServerResult<T> = Result<T, McpServerError>;

/// Trait for tool implementations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments.
    async fn execute(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> McpServerResult<ToolResult>;
}

/// Context for tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Request correlation ID
    pub correlation_id: String,
}

impl ToolContext {
    /// Create a context with a fresh correlation ID.
    pub fn new() -> Self {
        Self {
            correlation_id: uuid::Uuid::now_v7().to_string(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize tool arguments, mapping failures to `InvalidParams`.
pub fn parse_args<T>(args: serde_json::Value) -> McpServerResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(args).map_err(|e| McpServerError::InvalidParams(e.to_string()))
}

/// MCP server.
///
/// Holds one integration's tool catalog and answers JSON-RPC requests
/// against it.
pub struct McpServer {
    /// Server info
    info: ServerInfo,

    /// Server capabilities
    capabilities: ServerCapabilities,

    /// Registered tools, in registration order
    tools: Vec<(ToolDefinition, Arc<dyn Tool>)>,

    /// Tool name to position in `tools`
    index: HashMap<String, usize>,
}

impl McpServer {
    /// Create a new MCP server with an empty catalog.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities {
                    list_changed: false,
                }),
            },
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Names must be unique.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> McpServerResult<()> {
        let definition = tool.definition();
        if self.index.contains_key(&definition.name) {
            return Err(McpServerError::DuplicateTool(definition.name));
        }

        debug!(tool = %definition.name, "Registering tool");
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push((definition, tool));
        Ok(())
    }

    /// Register multiple tools.
    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> McpServerResult<Self> {
        for tool in tools {
            self.register_tool(tool)?;
        }
        Ok(self)
    }

    /// Get all tool definitions in registration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|(definition, _)| definition.clone()).collect()
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Execute a tool in its own task.
    ///
    /// A panicking handler is reported as `ExecutionError`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        context: ToolContext,
    ) -> McpServerResult<ToolResult> {
        let tool = self
            .index
            .get(name)
            .map(|&position| Arc::clone(&self.tools[position].1))
            .ok_or_else(|| McpServerError::ToolNotFound(name.to_string()))?;

        let handle = tokio::spawn(async move { tool.execute(arguments, &context).await });

        match handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => Err(McpServerError::ExecutionError(
                format!("tool '{}' panicked", name),
            )),
            Err(join_error) => Err(McpServerError::ExecutionError(join_error.to_string())),
        }
    }

    /// Execute a tool call and fold every failure into an error result.
    pub async fn invoke(&self, call: ToolCall) -> ToolResult {
        let context = ToolContext::new();
        let correlation_id = context.correlation_id.clone();
        info!(tool = %call.name, %correlation_id, "Invoking tool");

        match self.call_tool(&call.name, call.arguments, context).await {
            Ok(result) => {
                debug!(tool = %call.name, %correlation_id, is_error = result.is_error, "Tool completed");
                result
            }
            Err(e) => {
                match &e {
                    McpServerError::Upstream(upstream) if upstream.is_transport() => {
                        error!(tool = %call.name, %correlation_id, error = %e, "Upstream unreachable")
                    }
                    McpServerError::ExecutionError(_) => {
                        error!(tool = %call.name, %correlation_id, error = %e, "Tool execution failed")
                    }
                    _ => warn!(tool = %call.name, %correlation_id, error = %e, "Tool call failed"),
                }
                ToolResult::error(format!("Error: {}", e))
            }
        }
    }

    /// Handle one raw line from the invocation channel.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparseable request line");
                return Some(McpResponse::error(RequestId::Null, McpError::parse_error()));
            }
        };

        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value(id).ok())
            .unwrap_or_default();

        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!(error = %e, "Malformed JSON-RPC request");
                Some(McpResponse::error(id, McpError::invalid_request()))
            }
        }
    }

    /// Handle an MCP request. Notifications yield no response.
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "Received notification");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "ping" => McpResponse::success(request.id, serde_json::json!({})),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => {
                debug!(method = %request.method, "Unknown method");
                McpResponse::error(request.id, McpError::method_not_found(&request.method))
            }
        };
        Some(response)
    }

    fn handle_initialize(&self, id: RequestId) -> McpResponse {
        McpResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": self.capabilities,
                "serverInfo": self.info
            }),
        )
    }

    fn handle_tools_list(&self, id: RequestId) -> McpResponse {
        McpResponse::success(id, serde_json::json!({ "tools": self.list_tools() }))
    }

    async fn handle_tools_call(
        &self,
        id: RequestId,
        params: Option<serde_json::Value>,
    ) -> McpResponse {
        let params = match params {
            Some(p) => p,
            None => return McpResponse::error(id, McpError::invalid_params("Missing params")),
        };

        let call: ToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return McpResponse::error(id, McpError::invalid_params(e.to_string())),
        };

        let result = self.invoke(call).await;
        match serde_json::to_value(result) {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => McpResponse::error(id, McpError::internal_error(e.to_string())),
        }
    }

    /// Get server info.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }
}
