//! Tool: search_flights — run a live flight search.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use farescope::airports::{normalize_airport, suggestions};
use farescope::{FlightScraper, SearchCriteria};

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct SearchParams {
    origin: String,
    destination: String,
    departure_date: String,
    #[serde(default)]
    return_date: Option<String>,
    #[serde(default = "default_trip_type")]
    trip_type: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_trip_type() -> String {
    "one_way".to_string()
}

fn default_max_results() -> usize {
    10
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "search_flights".to_string(),
        description: Some(
            "Search live flight prices for a route. Accepts IATA codes or common city names."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "origin": {
                    "type": "string",
                    "description": "Origin airport code or city name (e.g. JFK, \"new york\")"
                },
                "destination": {
                    "type": "string",
                    "description": "Destination airport code or city name"
                },
                "departure_date": {
                    "type": "string",
                    "description": "Departure date, YYYY-MM-DD"
                },
                "return_date": {
                    "type": "string",
                    "description": "Return date, YYYY-MM-DD (round trip only)"
                },
                "trip_type": {
                    "type": "string",
                    "enum": ["one_way", "round_trip"],
                    "default": "one_way"
                },
                "max_results": { "type": "integer", "default": 10, "maximum": 50 }
            },
            "required": ["origin", "destination", "departure_date"]
        }),
    }
}

fn resolve_airport(input: &str) -> McpResult<String> {
    normalize_airport(input).ok_or_else(|| {
        let hints = suggestions(input);
        if hints.is_empty() {
            McpError::UnknownAirport(input.to_string())
        } else {
            let hints: Vec<String> = hints
                .iter()
                .map(|(alias, code)| format!("{alias} ({code})"))
                .collect();
            McpError::UnknownAirport(format!("{input}; did you mean {}", hints.join(", ")))
        }
    })
}

fn parse_date(label: &str, value: &str) -> McpResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| McpError::InvalidParams(format!("{label} '{value}' is not YYYY-MM-DD: {e}")))
}

pub async fn execute(args: Value, scraper: &Arc<FlightScraper>) -> McpResult<ToolCallResult> {
    let params: SearchParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let origin = resolve_airport(&params.origin)?;
    let destination = resolve_airport(&params.destination)?;
    let departure = parse_date("departure_date", &params.departure_date)?;

    let mut criteria = match params.trip_type.as_str() {
        "one_way" => SearchCriteria::one_way(&origin, &destination, departure),
        "round_trip" => {
            let return_value = params.return_date.as_deref().ok_or_else(|| {
                McpError::InvalidParams("return_date required for round_trip".to_string())
            })?;
            let return_date = parse_date("return_date", return_value)?;
            SearchCriteria::round_trip(&origin, &destination, departure, return_date)
        }
        other => {
            return Err(McpError::InvalidParams(format!(
                "trip_type must be one_way or round_trip, got '{other}'"
            )));
        }
    };
    criteria.max_results = params.max_results;

    // Validation failures come back inside the structured result, same as
    // every other failure mode.
    let result = scraper.search(criteria).await;
    Ok(ToolCallResult::json(&result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_airport_error_carries_suggestions() {
        let err = resolve_airport("york").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("new york (JFK)"), "got: {text}");
    }

    #[test]
    fn city_names_resolve_before_the_search() {
        assert_eq!(resolve_airport("vegas").unwrap(), "LAS");
        assert_eq!(resolve_airport("lax").unwrap(), "LAX");
    }

    #[test]
    fn malformed_dates_are_invalid_params() {
        let err = parse_date("departure_date", "07/15/2026").unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }
}
