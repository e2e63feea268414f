//! Core data types for flight searches and extraction results.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One-way or round-trip itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl std::fmt::Display for TripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripType::OneWay => write!(f, "one_way"),
            TripType::RoundTrip => write!(f, "round_trip"),
        }
    }
}

/// Upper bound on `max_results` accepted by [`SearchCriteria::validate`].
pub const MAX_RESULTS_LIMIT: usize = 50;

/// Validated flight search parameters.
///
/// The calling layer is expected to normalize city names to IATA codes
/// before constructing criteria; `validate` re-checks everything so the
/// engine fails fast on bad input instead of wasting a browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub trip_type: TripType,
    pub max_results: usize,
    pub passengers: u32,
}

impl SearchCriteria {
    /// Build one-way criteria with default bounds.
    pub fn one_way(origin: &str, destination: &str, departure_date: NaiveDate) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date,
            return_date: None,
            trip_type: TripType::OneWay,
            max_results: 10,
            passengers: 1,
        }
    }

    /// Build round-trip criteria with default bounds.
    pub fn round_trip(
        origin: &str,
        destination: &str,
        departure_date: NaiveDate,
        return_date: NaiveDate,
    ) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date,
            return_date: Some(return_date),
            trip_type: TripType::RoundTrip,
            max_results: 10,
            passengers: 1,
        }
    }

    /// Re-check all invariants the calling layer should already have enforced.
    pub fn validate(&self) -> ScrapeResult<()> {
        fn is_iata(code: &str) -> bool {
            code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
        }

        if !is_iata(&self.origin) {
            return Err(ScrapeError::InvalidCriteria(format!(
                "origin must be a 3-letter airport code, got {:?}",
                self.origin
            )));
        }
        if !is_iata(&self.destination) {
            return Err(ScrapeError::InvalidCriteria(format!(
                "destination must be a 3-letter airport code, got {:?}",
                self.destination
            )));
        }
        if self.origin == self.destination {
            return Err(ScrapeError::InvalidCriteria(
                "origin and destination are identical".to_string(),
            ));
        }
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(ScrapeError::InvalidCriteria(format!(
                "max_results must be between 1 and {MAX_RESULTS_LIMIT}, got {}",
                self.max_results
            )));
        }
        if self.passengers == 0 {
            return Err(ScrapeError::InvalidCriteria(
                "passenger count must be at least 1".to_string(),
            ));
        }
        match (self.trip_type, self.return_date) {
            (TripType::RoundTrip, None) => {
                return Err(ScrapeError::InvalidCriteria(
                    "round_trip requires a return date".to_string(),
                ));
            }
            (_, Some(ret)) if ret <= self.departure_date => {
                return Err(ScrapeError::InvalidCriteria(format!(
                    "return date {ret} must be after departure date {}",
                    self.departure_date
                )));
            }
            _ => {}
        }
        Ok(())
    }

    /// Deterministic cache key. Return date is excluded for one-way trips so
    /// a stale `return_date` field cannot split otherwise-identical lookups.
    pub fn fingerprint(&self) -> String {
        let ret = match self.trip_type {
            TripType::RoundTrip => self
                .return_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            TripType::OneWay => String::new(),
        };
        format!(
            "{}|{}|{}|{}|{}",
            self.origin, self.destination, self.departure_date, ret, self.trip_type
        )
    }
}

/// A single flight leg. Owned by exactly one [`FlightOffer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub airline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft: Option<String>,
}

/// A complete flight offer as rendered by the target site.
///
/// `stops` is derived from the segment list at construction time, so
/// `stops == segments.len() - 1` holds for every offer built through
/// [`FlightOffer::from_segments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    pub price: String,
    pub currency: String,
    pub stops: usize,
    pub total_duration: String,
    pub segments: Vec<FlightSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_link: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl FlightOffer {
    /// Build an offer from its segments, deriving the stop count.
    pub fn from_segments(
        price: String,
        currency: String,
        total_duration: String,
        segments: Vec<FlightSegment>,
    ) -> Self {
        let stops = segments.len().saturating_sub(1);
        Self {
            price,
            currency,
            stops,
            total_duration,
            segments,
            booking_link: None,
            scraped_at: Utc::now(),
        }
    }
}

/// Counts recorded while extracting one results page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    /// Name of the strategy that produced the offers, if any yielded data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Offers that failed field validation and were dropped.
    pub dropped_offers: usize,
}

/// The outcome of one orchestrated search, returned on every path.
///
/// "No flights available" and "search failed" are distinct: check both
/// `success` and the offer count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingResult {
    pub search_criteria: SearchCriteria,
    pub flights: Vec<FlightOffer>,
    pub total_results: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ExtractionDiagnostics>,
    pub scraped_at: DateTime<Utc>,
    /// Wall-clock time for the whole search, in seconds.
    pub execution_time: f64,
}

impl ScrapingResult {
    pub fn completed(
        criteria: SearchCriteria,
        flights: Vec<FlightOffer>,
        diagnostics: ExtractionDiagnostics,
        elapsed: Duration,
    ) -> Self {
        let total_results = flights.len();
        Self {
            search_criteria: criteria,
            flights,
            total_results,
            success: true,
            error_message: None,
            diagnostics: Some(diagnostics),
            scraped_at: Utc::now(),
            execution_time: elapsed.as_secs_f64(),
        }
    }

    pub fn failed(criteria: SearchCriteria, error: String, elapsed: Duration) -> Self {
        Self {
            search_criteria: criteria,
            flights: Vec::new(),
            total_results: 0,
            success: false,
            error_message: Some(error),
            diagnostics: None,
            scraped_at: Utc::now(),
            execution_time: elapsed.as_secs_f64(),
        }
    }
}

/// Typed error taxonomy for the extraction engine.
///
/// Display strings carry the taxonomy name so the orchestrator's
/// `error_message` funnel stays attributable by callers.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Bad input — never retried, surfaced immediately.
    #[error("InvalidCriteria: {0}")]
    InvalidCriteria(String),

    /// The browser session could not start within its bound.
    #[error("SessionInitError: {0}")]
    SessionInit(String),

    /// No expression in a locator strategy matched.
    #[error("ElementNotFound: {role} ({description}); tried {attempted:?}")]
    ElementNotFound {
        role: String,
        description: String,
        attempted: Vec<String>,
    },

    /// The workflow could not reach the results page.
    #[error("NavigationError: failed after reaching {last_state}: {reason}")]
    Navigation { last_state: String, reason: String },

    /// Every extraction strategy failed outright.
    #[error("ExtractionError: {0}")]
    Extraction(String),

    /// Waited past the absolute bound for rate-limit clearance.
    #[error("RateLimitTimeout: waited longer than {0:?}")]
    RateLimitTimeout(Duration),

    /// A suspend point exceeded its explicit timeout.
    #[error("Timeout: {operation} exceeded {limit:?}")]
    Timeout { operation: String, limit: Duration },

    /// Underlying browser/CDP failure.
    #[error("BrowserError: {0}")]
    Browser(String),
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
