//! Farescope — resilient flight-search extraction engine for JS-rendered travel sites.

pub mod airports;
pub mod config;
pub mod driver;
pub mod extract;
pub mod health;
pub mod limiter;
pub mod navigator;
pub mod orchestrator;
pub mod retry;
pub mod selectors;
pub mod session;
pub mod types;

pub use airports::normalize_airport;
pub use config::{HealthThresholds, ScraperConfig, SiteUrls};
pub use health::{HealthReport, HealthStatus};
pub use orchestrator::FlightScraper;
pub use types::*;
