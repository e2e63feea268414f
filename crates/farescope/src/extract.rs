//! Result extraction pipeline.
//!
//! Three in-page strategies run in order until one yields offers: semantic
//! (accessibility labels, most stable), structural (known class names), and
//! content (raw text heuristics, last resort). Each raw offer is parsed and
//! validated in isolation, so one malformed card never poisons the page.

use crate::driver::PageDriver;
use crate::types::{FlightOffer, FlightSegment, ScrapeError, ScrapeResult, SearchCriteria};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Semantic pass: results pages annotate each offer card with a full
/// aria-label sentence; those survive markup reshuffles far longer than
/// class names do.
const SEMANTIC_SCRIPT: &str = r#"
(() => {
    const cards = document.querySelectorAll('li[aria-label], div[role="listitem"][aria-label]');
    const offers = [];
    for (const card of cards) {
        const label = card.getAttribute('aria-label') || '';
        if (!label.match(/\$|€|£|¥/)) continue;
        offers.push({
            summary: label,
            price: (label.match(/[$€£¥]\s*[\d,]+(?:\.\d{2})?/) || [''])[0],
            airline: (label.match(/with\s+([A-Z][\w\s]+?)[,.]/) || ['', ''])[1].trim(),
            duration: (label.match(/\d+\s*hr?\s*(?:\d+\s*min)?/) || [''])[0],
            stops: (label.match(/Nonstop|\d+\s*stops?/i) || [''])[0],
            departure_time: (label.match(/[Ll]eaves[^0-9]*([\d:]+\s*[AP]M)/) || ['', ''])[1],
            arrival_time: (label.match(/[Aa]rrives[^0-9]*([\d:]+\s*[AP]M)/) || ['', ''])[1],
        });
    }
    return offers;
})()
"#;

const STRUCTURAL_SCRIPT: &str = r#"
(() => {
    const text = (root, sel) => {
        const el = root.querySelector(sel);
        return el ? el.textContent.trim() : '';
    };
    const cards = document.querySelectorAll('.pIav2d, .Rk10dc li');
    const offers = [];
    for (const card of cards) {
        const price = text(card, '.YMlIz, [data-gs] span[aria-label]');
        if (!price) continue;
        offers.push({
            price,
            airline: text(card, '.sSHqwe, .Ir0Voe .sSHqwe'),
            duration: text(card, '.gvkrdb, .AdWm1c.gvkrdb'),
            stops: text(card, '.EfT7Ae span, .ogfYpf'),
            departure_time: text(card, '[aria-label*="Departure time"]'),
            arrival_time: text(card, '[aria-label*="Arrival time"]'),
        });
    }
    return offers;
})()
"#;

/// Last resort: walk visible text for price-shaped tokens and take the
/// surrounding block as the offer summary.
const CONTENT_SCRIPT: &str = r#"
(() => {
    const offers = [];
    const seen = new Set();
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
    while (walker.nextNode()) {
        const t = walker.currentNode.textContent;
        const m = t.match(/[$€£¥]\s*[\d,]{2,}(?:\.\d{2})?/);
        if (!m) continue;
        const block = walker.currentNode.parentElement.closest('li, div');
        if (!block || seen.has(block)) continue;
        seen.add(block);
        const blockText = block.textContent.replace(/\s+/g, ' ').trim().slice(0, 400);
        offers.push({
            price: m[0],
            summary: blockText,
            airline: '',
            duration: (blockText.match(/\d+\s*hr?\s*(?:\d+\s*min)?/) || [''])[0],
            stops: (blockText.match(/Nonstop|\d+\s*stops?/i) || [''])[0],
            departure_time: '',
            arrival_time: '',
        });
    }
    return offers;
})()
"#;

/// One offer as reported by an in-page strategy, before validation.
#[derive(Debug, Deserialize)]
struct RawOffer {
    #[serde(default)]
    price: String,
    #[serde(default)]
    airline: String,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    stops: String,
    #[serde(default)]
    departure_time: String,
    #[serde(default)]
    arrival_time: String,
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub offers: Vec<FlightOffer>,
    /// Which strategy produced the offers; `None` when the page was readable
    /// but listed no flights.
    pub strategy: Option<String>,
    pub dropped: usize,
}

#[derive(Default)]
pub struct ExtractionPipeline;

impl ExtractionPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Run the strategy ladder against a results page. Zero offers is a
    /// successful outcome; only a page we cannot evaluate at all is an error.
    pub async fn extract(
        &self,
        driver: &dyn PageDriver,
        criteria: &SearchCriteria,
    ) -> ScrapeResult<ExtractionOutcome> {
        let strategies: [(&str, &str); 3] = [
            ("semantic", SEMANTIC_SCRIPT),
            ("structural", STRUCTURAL_SCRIPT),
            ("content", CONTENT_SCRIPT),
        ];

        let mut last_err = None;
        let mut evaluated = 0usize;
        for (name, script) in strategies {
            let raw = match driver.evaluate(script).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(strategy = name, error = %e, "strategy evaluation failed");
                    last_err = Some(e);
                    continue;
                }
            };
            evaluated += 1;

            let (offers, dropped) = self.parse_batch(raw, criteria);
            if !offers.is_empty() {
                tracing::info!(
                    strategy = name,
                    count = offers.len(),
                    dropped,
                    "extraction complete"
                );
                return Ok(ExtractionOutcome {
                    offers,
                    strategy: Some(name.to_string()),
                    dropped,
                });
            }
            tracing::debug!(strategy = name, dropped, "strategy yielded no offers");
        }

        // A page no strategy could even evaluate is unreadable; a page that
        // evaluated cleanly but listed nothing is an empty result.
        if evaluated == 0 {
            let detail = last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no strategies configured".to_string());
            return Err(ScrapeError::Extraction(format!(
                "all extraction strategies failed, last: {detail}"
            )));
        }
        Ok(ExtractionOutcome {
            offers: Vec::new(),
            strategy: None,
            dropped: 0,
        })
    }

    /// Parse raw offers independently, dropping (and counting) any that
    /// lack a usable price.
    fn parse_batch(&self, raw: Value, criteria: &SearchCriteria) -> (Vec<FlightOffer>, usize) {
        let items: Vec<RawOffer> = match serde_json::from_value(raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::debug!(error = %e, "strategy returned non-offer JSON");
                return (Vec::new(), 0);
            }
        };

        let mut offers = Vec::new();
        let mut dropped = 0;
        for item in items {
            match parse_offer(&item, criteria) {
                Some(offer) => offers.push(offer),
                None => dropped += 1,
            }
            if offers.len() >= criteria.max_results {
                break;
            }
        }
        (offers, dropped)
    }
}

/// Turn one raw card into a validated offer. Returns `None` when the card
/// carries no recognizable price.
fn parse_offer(raw: &RawOffer, criteria: &SearchCriteria) -> Option<FlightOffer> {
    let (price, currency) = parse_price(&raw.price)?;
    let stops = parse_stops(&raw.stops);
    let duration = parse_duration(&raw.duration);

    // Only the endpoints are observable on the listing page, so route the
    // known airline and times through the first and last synthesized legs.
    let segment_count = stops + 1;
    let segments: Vec<FlightSegment> = (0..segment_count)
        .map(|i| FlightSegment {
            airline: if i == 0 { raw.airline.clone() } else { String::new() },
            flight_number: None,
            departure_airport: if i == 0 {
                criteria.origin.clone()
            } else {
                String::new()
            },
            arrival_airport: if i == segment_count - 1 {
                criteria.destination.clone()
            } else {
                String::new()
            },
            departure_time: if i == 0 {
                raw.departure_time.clone()
            } else {
                String::new()
            },
            arrival_time: if i == segment_count - 1 {
                raw.arrival_time.clone()
            } else {
                String::new()
            },
            duration: if segment_count == 1 {
                duration.clone()
            } else {
                String::new()
            },
            aircraft: None,
        })
        .collect();

    Some(FlightOffer::from_segments(price, currency, duration, segments))
}

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([$€£¥])\s*([\d,]+(?:\.\d{2})?)").unwrap_or_else(|_| unreachable!())
    })
}

/// Extract a display price and ISO currency code from arbitrary card text.
pub fn parse_price(text: &str) -> Option<(String, String)> {
    let caps = price_re().captures(text)?;
    let symbol = caps.get(1)?.as_str();
    let amount = caps.get(2)?.as_str();
    let currency = match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        "¥" => "JPY",
        _ => return None,
    };
    Some((format!("{symbol}{amount}"), currency.to_string()))
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*h(?:r|our)?s?(?:\s*(\d+)\s*m(?:in)?s?)?")
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Normalize duration text to `"Hh Mm"`. Unrecognized text passes through
/// trimmed, so partial data is preserved rather than discarded.
pub fn parse_duration(text: &str) -> String {
    match duration_re().captures(text) {
        Some(caps) => {
            let hours = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
            let minutes = caps.get(2).map(|m| m.as_str()).unwrap_or("0");
            format!("{hours}h {minutes}m")
        }
        None => text.trim().to_string(),
    }
}

fn stops_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*stop").unwrap_or_else(|_| unreachable!()))
}

/// Stop count from card text; anything unrecognized reads as nonstop.
pub fn parse_stops(text: &str) -> usize {
    if text.to_ascii_lowercase().contains("nonstop") || text.eq_ignore_ascii_case("direct") {
        return 0;
    }
    stops_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::ScriptedDriver;
    use chrono::NaiveDate;
    use serde_json::json;

    fn criteria() -> SearchCriteria {
        SearchCriteria::one_way(
            "JFK",
            "LAX",
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
        )
    }

    fn pipeline() -> ExtractionPipeline {
        ExtractionPipeline::new()
    }

    #[test]
    fn price_parsing_handles_symbols_and_commas() {
        assert_eq!(
            parse_price("$1,234.56"),
            Some(("$1,234.56".to_string(), "USD".to_string()))
        );
        assert_eq!(
            parse_price("from € 451 round trip"),
            Some(("€451".to_string(), "EUR".to_string()))
        );
        assert_eq!(parse_price("no price here"), None);
    }

    #[test]
    fn duration_parsing_normalizes_common_shapes() {
        assert_eq!(parse_duration("5 hr 30 min"), "5h 30m");
        assert_eq!(parse_duration("2h"), "2h 0m");
        assert_eq!(parse_duration("  overnight  "), "overnight");
    }

    #[test]
    fn stop_parsing_reads_nonstop_and_counts() {
        assert_eq!(parse_stops("Nonstop"), 0);
        assert_eq!(parse_stops("2 stops"), 2);
        assert_eq!(parse_stops("1 stop in DEN"), 1);
        assert_eq!(parse_stops(""), 0);
    }

    #[test]
    fn offer_segments_match_derived_stop_count() {
        let raw = RawOffer {
            price: "$300".to_string(),
            airline: "Delta".to_string(),
            duration: "7 hr 15 min".to_string(),
            stops: "2 stops".to_string(),
            departure_time: "8:15 AM".to_string(),
            arrival_time: "3:30 PM".to_string(),
        };
        let offer = parse_offer(&raw, &criteria()).unwrap();
        assert_eq!(offer.stops, 2);
        assert_eq!(offer.segments.len(), 3);
        assert_eq!(offer.segments[0].departure_airport, "JFK");
        assert_eq!(offer.segments[2].arrival_airport, "LAX");
        assert_eq!(offer.total_duration, "7h 15m");
    }

    #[tokio::test]
    async fn malformed_card_is_dropped_without_losing_the_rest() {
        let mut driver = ScriptedDriver::new();
        driver.eval_responses.push((
            "getAttribute".to_string(),
            json!([
                { "price": "$420", "airline": "United", "duration": "6 hr",
                  "stops": "Nonstop", "departure_time": "9:00 AM", "arrival_time": "12:00 PM" },
                { "price": "see site", "airline": "", "duration": "", "stops": "",
                  "departure_time": "", "arrival_time": "" },
                { "price": "$510", "airline": "Delta", "duration": "6 hr 20 min",
                  "stops": "1 stop", "departure_time": "", "arrival_time": "" }
            ]),
        ));

        let outcome = pipeline().extract(&driver, &criteria()).await.unwrap();
        assert_eq!(outcome.offers.len(), 2);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.strategy.as_deref(), Some("semantic"));
    }

    #[tokio::test]
    async fn falls_through_to_later_strategy_when_semantic_is_empty() {
        let mut driver = ScriptedDriver::new();
        driver.eval_responses.push(("getAttribute".to_string(), json!([])));
        driver.eval_responses.push((
            "pIav2d".to_string(),
            json!([{ "price": "$199", "airline": "JetBlue", "duration": "5 hr 45 min",
                     "stops": "Nonstop", "departure_time": "", "arrival_time": "" }]),
        ));

        let outcome = pipeline().extract(&driver, &criteria()).await.unwrap();
        assert_eq!(outcome.offers.len(), 1);
        assert_eq!(outcome.strategy.as_deref(), Some("structural"));
    }

    #[tokio::test]
    async fn empty_page_is_success_with_no_offers() {
        let driver = ScriptedDriver::new();
        let outcome = pipeline().extract(&driver, &criteria()).await.unwrap();
        assert!(outcome.offers.is_empty());
        assert!(outcome.strategy.is_none());
        assert_eq!(outcome.dropped, 0);
    }

    #[tokio::test]
    async fn result_count_is_bounded_by_max_results() {
        let cards: Vec<_> = (0..10)
            .map(|i| {
                json!({ "price": format!("${}", 100 + i), "airline": "AA",
                        "duration": "3 hr", "stops": "Nonstop",
                        "departure_time": "", "arrival_time": "" })
            })
            .collect();
        let mut driver = ScriptedDriver::new();
        driver
            .eval_responses
            .push(("getAttribute".to_string(), json!(cards)));

        let mut bounded = criteria();
        bounded.max_results = 3;
        let outcome = pipeline().extract(&driver, &bounded).await.unwrap();
        assert_eq!(outcome.offers.len(), 3);
    }
}
