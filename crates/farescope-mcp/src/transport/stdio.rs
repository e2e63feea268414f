//! Stdio transport: frames in on stdin, frames out on stdout.
//!
//! Desktop MCP clients spawn the server as a child process and own both
//! pipes, so EOF on stdin is the normal shutdown signal. Logging goes to
//! stderr; stdout carries nothing but frames.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcError, McpResult, RequestId};

use super::framing;

pub struct StdioTransport {
    handler: ProtocolHandler,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    /// Serve until the client closes stdin.
    pub async fn run(&self) -> McpResult<()> {
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        tracing::info!("serving MCP over stdio");

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                tracing::info!("client closed stdin, shutting down");
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            // An unparseable frame has no usable id, so the error goes back
            // with a null one rather than killing the connection.
            let reply = match framing::parse_message(&line) {
                Ok(msg) => self.handler.handle_message(msg).await,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unparseable frame");
                    let error = JsonRpcError::new(RequestId::Null, e.code(), e.to_string());
                    serde_json::to_value(error).ok()
                }
            };

            if let Some(value) = reply {
                stdout
                    .write_all(framing::frame_message(&value)?.as_bytes())
                    .await?;
                stdout.flush().await?;
            }
        }
    }
}
