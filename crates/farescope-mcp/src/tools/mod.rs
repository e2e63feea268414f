//! MCP tool implementations.

pub mod airport_info;
pub mod registry;
pub mod scraper_status;
pub mod search_flights;

pub use registry::ToolRegistry;
