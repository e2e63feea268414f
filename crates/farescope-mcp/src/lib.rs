//! Farescope MCP Server — flight search tools for LLM clients over JSON-RPC.

pub mod output;
pub mod protocol;
pub mod tools;
pub mod transport;
pub mod types;

pub use protocol::ProtocolHandler;
pub use transport::StdioTransport;
