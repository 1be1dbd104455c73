//! Newline-delimited JSON-RPC over a byte stream.
//!
//! Each input line is handled in its own task so slow upstream calls do not
//! block later requests. Responses funnel through one channel to a single
//! writer and may therefore leave in a different order than requests
//! arrived; clients correlate by `id`.

use crate::server::McpServer;
use crate::types::{McpError, McpResponse, RequestId};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// Returns once the input is exhausted and every in-flight request has been
/// answered. A line that is not valid UTF-8 is answered with a parse error
/// and reading continues.
pub async fn serve<R, W>(server: Arc<McpServer>, mut reader: R, writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::unbounded_channel::<McpResponse>();

    let read_loop = async move {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(error = %e, bytes = buf.len(), "Request line is not valid UTF-8");
                    // The writer only goes away when output is broken.
                    let _ = tx.send(McpResponse::error(RequestId::Null, McpError::parse_error()));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            trace!(bytes = line.len(), "Received request line");

            let line = line.to_string();
            let server = Arc::clone(&server);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_line(&line).await {
                    let _ = tx.send(response);
                }
            });
        }
        debug!("Input closed");
        Ok::<(), io::Error>(())
    };

    let (read_result, write_result) = tokio::join!(read_loop, write_responses(rx, writer));
    read_result?;
    write_result
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<McpResponse>, mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
