//! Gateway process lifecycle.
//!
//! ```text
//! Starting -> ConnectivityProbe -> Ready -> Serving -> ShuttingDown -> Stopped
//!                               \-> Failed
//! ```
//!
//! Nothing is bound and nothing is written to the invocation channel until
//! the upstream probe has passed.

use crate::clients::{ConfigError, GatewaySettings, UpstreamError};
use crate::health::{self, HealthServer, HealthState};
use crate::integration::Integration;
use crate::server::{McpServer, McpServerError};
use crate::transport;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fatal gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An upstream client could not be constructed.
    #[error("Failed to set up upstream client: {0}")]
    Setup(#[source] UpstreamError),

    /// The startup probe failed.
    #[error("Connectivity check failed: {0}")]
    Connectivity(#[source] UpstreamError),

    /// The tool catalog could not be registered.
    #[error("Invalid tool catalog: {0}")]
    Registry(#[from] McpServerError),

    /// The health endpoint could not bind.
    #[error("Failed to bind health endpoint on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The invocation channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Starting,
    ConnectivityProbe,
    Ready,
    Failed,
    Serving,
    ShuttingDown,
    Stopped,
}

impl GatewayState {
    /// Log-friendly name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Starting => "starting",
            GatewayState::ConnectivityProbe => "connectivity_probe",
            GatewayState::Ready => "ready",
            GatewayState::Failed => "failed",
            GatewayState::Serving => "serving",
            GatewayState::ShuttingDown => "shutting_down",
            GatewayState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway for one integration.
pub struct Gateway<I: Integration> {
    integration: Arc<I>,
    server: Arc<McpServer>,
    settings: GatewaySettings,
    state: GatewayState,
}

impl<I: Integration> Gateway<I> {
    /// Register the integration's catalog.
    pub fn new(integration: I, settings: GatewaySettings) -> Result<Self, GatewayError> {
        let server = McpServer::new(I::SERVICE, env!("CARGO_PKG_VERSION"))
            .with_tools(integration.tools())?;
        info!(service = I::SERVICE, tools = server.tool_count(), "Tool catalog registered");

        Ok(Self {
            integration: Arc::new(integration),
            server: Arc::new(server),
            settings,
            state: GatewayState::Starting,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GatewayState {
        self.state
    }

    /// The dispatcher.
    pub fn server(&self) -> &Arc<McpServer> {
        &self.server
    }

    fn transition(&mut self, next: GatewayState) {
        info!(
            service = I::SERVICE,
            from = %self.state,
            to = %next,
            "Gateway state transition"
        );
        self.state = next;
    }

    /// Serve stdin/stdout until EOF, SIGINT or SIGTERM.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.run_until(stdin, tokio::io::stdout(), shutdown_signal()).await
    }

    /// Serve the given streams until EOF.
    pub async fn run_with_io<R, W>(&mut self, reader: R, writer: W) -> Result<(), GatewayError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.run_until(reader, writer, std::future::pending::<()>()).await
    }

    /// Serve the given streams until EOF or `shutdown` resolves.
    pub async fn run_until<R, W, F>(
        &mut self,
        reader: R,
        writer: W,
        shutdown: F,
    ) -> Result<(), GatewayError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        self.transition(GatewayState::ConnectivityProbe);
        match self.integration.probe().await {
            Ok(details) => {
                info!(
                    service = I::SERVICE,
                    details = %serde_json::Value::Object(details),
                    "Connectivity check passed"
                );
                self.transition(GatewayState::Ready);
            }
            Err(e) => {
                error!(service = I::SERVICE, error = %e, "Connectivity check failed");
                self.transition(GatewayState::Failed);
                return Err(GatewayError::Connectivity(e));
            }
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.settings.health_port));
        let state = Arc::new(HealthState::new(
            Arc::clone(&self.integration),
            Arc::clone(&self.server),
        ));
        let health = match HealthServer::bind(addr, health::router(state)).await {
            Ok(health) => health,
            Err(e) => {
                error!(error = %e, "Health endpoint unavailable");
                self.transition(GatewayState::Failed);
                return Err(e);
            }
        };

        self.transition(GatewayState::Serving);
        let served = tokio::select! {
            result = transport::serve(Arc::clone(&self.server), reader, writer) => {
                info!("Invocation channel closed");
                result.map_err(GatewayError::Io)
            }
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        };

        self.transition(GatewayState::ShuttingDown);
        health.shutdown().await;
        self.transition(GatewayState::Stopped);
        served
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: &str) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run a gateway binary to completion on a current-thread runtime.
///
/// The runtime is shut down without waiting for blocking work: tokio reads
/// stdin on a blocking thread that only returns once the client writes or
/// closes stdin, and a signal-driven shutdown must not wait for either.
pub fn launch<I: Integration>() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            init_tracing("info");
            error!(service = I::SERVICE, error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(bootstrap::<I>());
    runtime.shutdown_background();
    code
}

/// Load configuration, then build and run the gateway.
pub async fn bootstrap<I: Integration>() -> ExitCode {
    dotenvy::dotenv().ok();

    let settings = match GatewaySettings::from_env(I::DEFAULT_PORT) {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing("info");
            error!(service = I::SERVICE, error = %e, "Invalid gateway settings");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&settings.log_level);
    info!(
        service = I::SERVICE,
        version = env!("CARGO_PKG_VERSION"),
        state = %GatewayState::Starting,
        health_port = settings.health_port,
        "Starting gateway"
    );

    let integration = match I::from_env() {
        Ok(integration) => integration,
        Err(e) => {
            error!(service = I::SERVICE, error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut gateway = match Gateway::new(integration, settings) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(service = I::SERVICE, error = %e, "Failed to build gateway");
            return ExitCode::FAILURE;
        }
    };

    match gateway.run().await {
        Ok(()) => {
            info!(service = I::SERVICE, "Gateway stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(service = I::SERVICE, error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(GatewayState::ConnectivityProbe.to_string(), "connectivity_probe");
        assert_eq!(GatewayState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_config_error_passes_through() {
        let err: GatewayError = ConfigError::MissingEnvVar("GITHUB_TOKEN".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: GITHUB_TOKEN"
        );
    }

    #[test]
    fn test_connectivity_error_mentions_status() {
        let err = GatewayError::Connectivity(UpstreamError::Api {
            service: "GitHub",
            status: 401,
            body: "Bad credentials".to_string(),
        });
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("Bad credentials"));
    }
}
