//! Tool: airport_info — resolve city names to IATA codes.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use farescope::airports::{aliases_for, normalize_airport, suggestions};
use farescope::FlightScraper;

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct InfoParams {
    airport: String,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "airport_info".to_string(),
        description: Some(
            "Resolve an airport code or city name to its IATA code, with known aliases."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "airport": {
                    "type": "string",
                    "description": "IATA code or city name to look up"
                }
            },
            "required": ["airport"]
        }),
    }
}

pub async fn execute(args: Value, _scraper: &Arc<FlightScraper>) -> McpResult<ToolCallResult> {
    let params: InfoParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    match normalize_airport(&params.airport) {
        Some(code) => Ok(ToolCallResult::json(&json!({
            "input": params.airport,
            "code": code,
            "aliases": aliases_for(&code),
        }))),
        None => {
            let hints: Vec<Value> = suggestions(&params.airport)
                .into_iter()
                .map(|(alias, code)| json!({ "alias": alias, "code": code }))
                .collect();
            Ok(ToolCallResult::json(&json!({
                "input": params.airport,
                "code": Value::Null,
                "suggestions": hints,
            })))
        }
    }
}
