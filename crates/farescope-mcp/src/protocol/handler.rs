//! JSON-RPC dispatch for the flight-search tool surface.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::Value;

use farescope::FlightScraper;

use crate::tools::ToolRegistry;
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;

/// Routes incoming messages to the handshake, tool listing, or tool
/// execution paths. One handler serves the whole connection.
pub struct ProtocolHandler {
    scraper: Arc<FlightScraper>,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
}

/// Envelope checks that apply before any method-specific handling.
fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "unsupported jsonrpc version {:?}, this server speaks {JSONRPC_VERSION}",
            request.jsonrpc
        )));
    }
    if request.method.is_empty() {
        return Err(McpError::InvalidRequest("empty method name".to_string()));
    }
    Ok(())
}

impl ProtocolHandler {
    pub fn new(scraper: Arc<FlightScraper>) -> Self {
        Self {
            scraper,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
        }
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("ignoring response-shaped message from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        tracing::debug!(id = %id, method = request.method.as_str(), "dispatching request");
        let result = self.dispatch_request(&request).await;

        match result {
            Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default(),
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,
            "shutdown" => self.handle_shutdown().await,

            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params.clone()).await,

            "ping" => Ok(Value::Object(serde_json::Map::new())),

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" => {
                self.capabilities.lock().await.mark_initialized();
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                // Searches are not interruptible mid-flight; the cancellation
                // is logged and the in-progress result is discarded client-side.
                match notification
                    .params
                    .map(serde_json::from_value::<CancelRequestParams>)
                {
                    Some(Ok(params)) => tracing::info!(
                        request_id = %params.request_id,
                        reason = params.reason.as_deref().unwrap_or("none given"),
                        "client cancelled request"
                    ),
                    _ => tracing::info!("client cancelled a request without a usable id"),
                }
            }
            _ => {
                tracing::debug!(method = notification.method.as_str(), "unknown notification");
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("initialize params required".to_string()))?;

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params)?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_shutdown(&self) -> McpResult<Value> {
        tracing::info!("shutdown requested");
        Ok(Value::Object(serde_json::Map::new()))
    }

    async fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: ToolRegistry::list_tools(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("tool call params required".to_string()))?;

        let result =
            ToolRegistry::call(&call_params.name, call_params.arguments, &self.scraper).await?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}
