//! Search orchestration.
//!
//! `FlightScraper` owns the full pipeline: criteria validation, cache and
//! rate-limit gates, session acquisition, the navigation workflow, and
//! extraction. Every path funnels into a structured [`ScrapingResult`];
//! `search` itself never returns an error.

use crate::config::ScraperConfig;
use crate::extract::{ExtractionOutcome, ExtractionPipeline};
use crate::health::{HealthMonitor, HealthReport};
use crate::limiter::{RateLimiter, ResultCache};
use crate::navigator::Navigator;
use crate::retry::RetryPolicy;
use crate::selectors::SelectorRegistry;
use crate::session::{PageSession, SessionManager, SessionProvider};
use crate::types::{ExtractionDiagnostics, ScrapeResult, ScrapingResult, SearchCriteria};
use std::sync::Arc;
use std::time::Instant;

pub struct FlightScraper {
    config: Arc<ScraperConfig>,
    registry: Arc<SelectorRegistry>,
    provider: Arc<dyn SessionProvider>,
    pipeline: ExtractionPipeline,
    limiter: RateLimiter,
    cache: ResultCache,
    monitor: HealthMonitor,
}

impl FlightScraper {
    pub fn new(config: ScraperConfig) -> Self {
        let config = Arc::new(config);
        let provider = Arc::new(SessionManager::new(Arc::clone(&config)));
        Self::with_provider(config, provider)
    }

    /// Construct with an explicit session source. The seam tests use to run
    /// the whole orchestration without a browser.
    pub fn with_provider(config: Arc<ScraperConfig>, provider: Arc<dyn SessionProvider>) -> Self {
        let registry = Arc::new(SelectorRegistry::default_registry(
            config.element_timeout,
            config.results_timeout,
        ));
        Self {
            registry: Arc::clone(&registry),
            pipeline: ExtractionPipeline::new(),
            limiter: RateLimiter::new(config.rate_limit, config.rate_window, config.rate_max_wait),
            cache: ResultCache::new(config.cache_ttl),
            monitor: HealthMonitor::new(config.health),
            provider,
            config,
        }
    }

    /// Run one search end to end. Always returns a result: on failure the
    /// result carries `success = false` and the taxonomy-named error text.
    pub async fn search(&self, criteria: SearchCriteria) -> ScrapingResult {
        let started = Instant::now();

        if let Err(e) = criteria.validate() {
            return ScrapingResult::failed(criteria, e.to_string(), started.elapsed());
        }

        let key = criteria.fingerprint();
        if let Some(cached) = self.cache.get(&key).await {
            tracing::info!(key = key.as_str(), "cache hit");
            return cached;
        }

        let outcome = self.gated_attempt(&criteria).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(outcome) => {
                self.monitor.log().record("search", true, elapsed, None).await;
                let diagnostics = ExtractionDiagnostics {
                    strategy: outcome.strategy,
                    dropped_offers: outcome.dropped,
                };
                let result =
                    ScrapingResult::completed(criteria, outcome.offers, diagnostics, elapsed);
                self.cache.insert(key, result.clone()).await;
                result
            }
            Err(e) => {
                self.monitor.log().record("search", false, elapsed, None).await;
                tracing::error!(error = %e, "search failed");
                ScrapingResult::failed(criteria, e.to_string(), elapsed)
            }
        }
    }

    async fn gated_attempt(&self, criteria: &SearchCriteria) -> ScrapeResult<ExtractionOutcome> {
        self.limiter.acquire().await?;

        // Steps inside the workflow retry themselves; the orchestrator only
        // retries getting a session at all.
        let policy = RetryPolicy::new(self.config.step_retries, self.config.retry_base_delay);
        let session: Box<dyn PageSession> =
            policy.run("acquire_session", || self.provider.acquire()).await?;

        let result = self.drive(session.as_ref(), criteria).await;
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "session teardown failed");
        }
        result
    }

    async fn drive(
        &self,
        session: &dyn PageSession,
        criteria: &SearchCriteria,
    ) -> ScrapeResult<ExtractionOutcome> {
        let driver = session.driver();
        let mut navigator = Navigator::new(Arc::clone(&self.registry), Arc::clone(&self.config));
        navigator.run(driver, criteria).await?;
        self.pipeline.extract(driver, criteria).await
    }

    pub async fn health(&self) -> HealthReport {
        self.monitor.report(&self.registry).await
    }

    pub async fn cached_searches(&self) -> usize {
        self.cache.len().await
    }

    pub async fn requests_in_window(&self) -> usize {
        self.limiter.in_flight().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::ScriptedDriver;
    use crate::driver::PageDriver;
    use crate::health::HealthStatus;
    use crate::types::ScrapeError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    struct StubSession {
        driver: ScriptedDriver,
    }

    #[async_trait]
    impl PageSession for StubSession {
        fn driver(&self) -> &dyn PageDriver {
            &self.driver
        }

        async fn close(self: Box<Self>) -> ScrapeResult<()> {
            Ok(())
        }
    }

    /// Hands out scripted sessions and counts acquisitions.
    struct StubProvider {
        selectors: Vec<String>,
        eval_responses: Vec<(String, Value)>,
        fail_init: bool,
        acquisitions: AtomicU64,
    }

    impl StubProvider {
        fn full_form() -> Self {
            Self {
                selectors: [
                    r#"input[placeholder*="Where from"]"#,
                    r#"input[placeholder*="Where to"]"#,
                    r#"input[placeholder*="Departure"]"#,
                    r#"input[placeholder*="Return"]"#,
                    r#"button[aria-label*="Search"]"#,
                    r#"div[role="tabpanel"] ul li"#,
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                eval_responses: Vec::new(),
                fail_init: false,
                acquisitions: AtomicU64::new(0),
            }
        }

        fn with_offers(mut self) -> Self {
            self.eval_responses.push((
                "getAttribute".to_string(),
                json!([
                    { "price": "$451", "airline": "Delta", "duration": "5 hr 30 min",
                      "stops": "Nonstop", "departure_time": "8:15 AM", "arrival_time": "11:45 AM" },
                    { "price": "$389", "airline": "United", "duration": "8 hr 5 min",
                      "stops": "1 stop", "departure_time": "6:00 AM", "arrival_time": "2:05 PM" }
                ]),
            ));
            self
        }
    }

    #[async_trait]
    impl SessionProvider for StubProvider {
        async fn acquire(&self) -> ScrapeResult<Box<dyn PageSession>> {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(ScrapeError::SessionInit(
                    "browser did not start within 30s".to_string(),
                ));
            }
            Ok(Box::new(StubSession {
                driver: ScriptedDriver {
                    present: self.selectors.iter().cloned().collect(),
                    eval_responses: self.eval_responses.clone(),
                    ..ScriptedDriver::new()
                },
            }))
        }
    }

    fn fast_config() -> ScraperConfig {
        let mut config = ScraperConfig::default();
        config.step_retries = 1;
        config.retry_base_delay = Duration::from_millis(1);
        config.delay_range = (Duration::ZERO, Duration::ZERO);
        config.element_timeout = Duration::from_millis(5);
        config.results_timeout = Duration::from_millis(5);
        config.rate_max_wait = Duration::from_millis(10);
        config
    }

    fn scraper(provider: StubProvider) -> (FlightScraper, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        let scraper = FlightScraper::with_provider(
            Arc::new(fast_config()),
            Arc::clone(&provider) as Arc<dyn SessionProvider>,
        );
        (scraper, provider)
    }

    fn jfk_lax() -> SearchCriteria {
        SearchCriteria::one_way(
            "JFK",
            "LAX",
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
        )
    }

    #[tokio::test]
    async fn successful_search_returns_offers_and_diagnostics() {
        let (scraper, _) = scraper(StubProvider::full_form().with_offers());
        let result = scraper.search(jfk_lax()).await;

        assert!(result.success, "error: {:?}", result.error_message);
        assert_eq!(result.total_results, 2);
        assert_eq!(result.flights[0].price, "$451");
        assert_eq!(result.flights[1].stops, 1);
        let diagnostics = result.diagnostics.unwrap();
        assert_eq!(diagnostics.strategy.as_deref(), Some("semantic"));
        assert_eq!(diagnostics.dropped_offers, 0);
    }

    #[tokio::test]
    async fn empty_results_page_is_a_successful_search() {
        let (scraper, _) = scraper(StubProvider::full_form());
        let result = scraper.search(jfk_lax()).await;

        assert!(result.success);
        assert_eq!(result.total_results, 0);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn session_init_failure_funnels_into_the_result() {
        let mut provider = StubProvider::full_form();
        provider.fail_init = true;
        let (scraper, _) = scraper(provider);

        let result = scraper.search(jfk_lax()).await;
        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("SessionInitError"), "got: {message}");
        assert!(result.flights.is_empty());
    }

    #[tokio::test]
    async fn repeat_search_is_served_from_cache_without_a_session() {
        let (scraper, provider) = scraper(StubProvider::full_form().with_offers());

        let first = scraper.search(jfk_lax()).await;
        let second = scraper.search(jfk_lax()).await;

        assert!(first.success && second.success);
        assert_eq!(first.total_results, second.total_results);
        assert_eq!(provider.acquisitions.load(Ordering::SeqCst), 1);
        assert_eq!(scraper.cached_searches().await, 1);
    }

    #[tokio::test]
    async fn invalid_criteria_fails_without_touching_a_session() {
        let (scraper, provider) = scraper(StubProvider::full_form());

        let mut criteria = jfk_lax();
        criteria.destination = "JFK".to_string();
        let result = scraper.search(criteria).await;

        assert!(!result.success);
        assert!(result
            .error_message
            .unwrap()
            .contains("InvalidCriteria"));
        assert_eq!(provider.acquisitions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn saturated_rate_window_fails_distinct_searches() {
        let mut config = fast_config();
        config.rate_limit = 1;
        config.rate_window = Duration::from_secs(60);
        let provider = Arc::new(StubProvider::full_form().with_offers());
        let scraper = FlightScraper::with_provider(
            Arc::new(config),
            Arc::clone(&provider) as Arc<dyn SessionProvider>,
        );

        let first = scraper.search(jfk_lax()).await;
        assert!(first.success);

        let other = SearchCriteria::one_way(
            "BOS",
            "SFO",
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
        );
        let second = scraper.search(other).await;
        assert!(!second.success);
        assert!(second
            .error_message
            .unwrap()
            .contains("RateLimitTimeout"));
    }

    #[tokio::test]
    async fn failures_surface_in_the_health_report() {
        let mut provider = StubProvider::full_form();
        provider.fail_init = true;
        let (scraper, _) = scraper(provider);

        for _ in 0..3 {
            let _ = scraper.search(jfk_lax()).await;
        }
        let report = scraper.health().await;
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.operations_in_window, 3);
    }
}
