//! MCP protocol handling: JSON-RPC dispatch and capability negotiation.

pub mod handler;
pub mod negotiation;

pub use handler::ProtocolHandler;
