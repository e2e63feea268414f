//! Tool: scraper_status — engine health and utilization.

use std::sync::Arc;

use serde_json::{json, Value};

use farescope::FlightScraper;

use crate::types::{McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "scraper_status".to_string(),
        description: Some(
            "Report extraction engine health: search success rates, per-selector \
             reliability, cache size, and rate-limit utilization."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {}
        }),
    }
}

pub async fn execute(_args: Value, scraper: &Arc<FlightScraper>) -> McpResult<ToolCallResult> {
    let health = scraper.health().await;
    Ok(ToolCallResult::json(&json!({
        "health": health,
        "cached_searches": scraper.cached_searches().await,
        "requests_in_window": scraper.requests_in_window().await,
    })))
}
