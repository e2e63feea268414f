//! Tool registration and dispatch.

use std::sync::Arc;

use serde_json::Value;

use farescope::FlightScraper;

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::{airport_info, scraper_status, search_flights};

pub struct ToolRegistry;

impl ToolRegistry {
    pub fn list_tools() -> Vec<ToolDefinition> {
        vec![
            search_flights::definition(),
            airport_info::definition(),
            scraper_status::definition(),
        ]
    }

    pub async fn call(
        name: &str,
        arguments: Option<Value>,
        scraper: &Arc<FlightScraper>,
    ) -> McpResult<ToolCallResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            "search_flights" => search_flights::execute(args, scraper).await,
            "airport_info" => airport_info::execute(args, scraper).await,
            "scraper_status" => scraper_status::execute(args, scraper).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
