//! Newline-delimited JSON framing.
//!
//! Every message occupies exactly one line on the wire. The transport
//! skips blank lines before they reach the parser, so an empty frame here
//! is always a client bug.

use crate::types::{JsonRpcMessage, McpError, McpResult};

/// Decode one wire frame into a message.
pub fn parse_message(line: &str) -> McpResult<JsonRpcMessage> {
    let frame = line.trim();
    if frame.is_empty() {
        return Err(McpError::ParseError("empty frame".to_string()));
    }
    serde_json::from_str(frame).map_err(|e| McpError::ParseError(e.to_string()))
}

/// Render a response value as one newline-terminated wire frame.
pub fn frame_message(value: &serde_json::Value) -> McpResult<String> {
    let mut frame = serde_json::to_string(value)?;
    frame.push('\n');
    Ok(frame)
}
