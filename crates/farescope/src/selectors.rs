//! Selector resolution engine.
//!
//! The target site reshuffles its markup often enough that any single
//! hard-coded selector rots within weeks. Each logical UI role therefore
//! carries an ordered list of fallback expressions; resolution walks the
//! list and tracks which expression last worked so long-running processes
//! converge on the cheapest probe without ever discarding fallbacks.

use crate::driver::PageDriver;
use crate::types::{ScrapeError, ScrapeResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sentinel for "no expression has succeeded yet".
const NO_SUCCESS: usize = usize::MAX;

/// Ordered fallback expressions for one logical UI role, with health
/// counters shared across concurrent sessions.
pub struct LocatorStrategy {
    pub role: String,
    pub description: String,
    expressions: Vec<String>,
    pub timeout: Duration,
    successes: AtomicU64,
    failures: AtomicU64,
    last_success: AtomicUsize,
}

impl LocatorStrategy {
    pub fn new(
        role: &str,
        description: &str,
        expressions: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            role: role.to_string(),
            description: description.to_string(),
            expressions,
            timeout,
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_success: AtomicUsize::new(NO_SUCCESS),
        }
    }

    /// The base expression list, in priority order. Never reordered.
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Index of the most recently matching expression, if any.
    pub fn last_success_index(&self) -> Option<usize> {
        match self.last_success.load(Ordering::Relaxed) {
            NO_SUCCESS => None,
            idx => Some(idx),
        }
    }

    /// success / (success + failure), 0.0 when unattempted.
    pub fn success_rate(&self) -> f64 {
        let s = self.success_count() as f64;
        let f = self.failure_count() as f64;
        if s + f == 0.0 {
            0.0
        } else {
            s / (s + f)
        }
    }

    /// Probe order: the last successful expression first, then the rest in
    /// base list order. With no prior success this is plain list order.
    fn attempt_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = Vec::with_capacity(self.expressions.len());
        if let Some(hot) = self.last_success_index() {
            if hot < self.expressions.len() {
                order.push(hot);
            }
        }
        for idx in 0..self.expressions.len() {
            if Some(idx) != self.last_success_index() {
                order.push(idx);
            }
        }
        order
    }

    fn record_success(&self, index: usize) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.last_success.store(index, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Process-wide registry of locator strategies, shared by every session.
pub struct SelectorRegistry {
    strategies: HashMap<String, Arc<LocatorStrategy>>,
}

impl SelectorRegistry {
    pub fn new(strategies: Vec<LocatorStrategy>) -> Self {
        Self {
            strategies: strategies
                .into_iter()
                .map(|s| (s.role.clone(), Arc::new(s)))
                .collect(),
        }
    }

    /// The built-in role set for the flight search workflow. Form fields
    /// wait `element_timeout` per expression; the results container gets
    /// the longer `results_timeout` because the site renders it only after
    /// server-side search completes.
    pub fn default_registry(element_timeout: Duration, results_timeout: Duration) -> Self {
        let strat = |role: &str, desc: &str, exprs: &[&str]| {
            LocatorStrategy::new(
                role,
                desc,
                exprs.iter().map(|s| s.to_string()).collect(),
                element_timeout,
            )
        };

        Self::new(vec![
            strat(
                roles::ORIGIN_INPUT,
                "origin airport input",
                &[
                    r#"input[placeholder*="Where from"]"#,
                    r#"input[aria-label*="Where from"]"#,
                    r#"input[data-testid*="origin"]"#,
                    ".II2One input",
                ],
            ),
            strat(
                roles::DESTINATION_INPUT,
                "destination airport input",
                &[
                    r#"input[placeholder*="Where to"]"#,
                    r#"input[aria-label*="Where to"]"#,
                    r#"input[data-testid*="destination"]"#,
                    ".II2One input:nth-child(2)",
                ],
            ),
            strat(
                roles::DEPARTURE_DATE,
                "departure date field",
                &[
                    r#"input[placeholder*="Departure"]"#,
                    r#"input[aria-label*="Departure"]"#,
                    r#"input[data-testid*="departure"]"#,
                ],
            ),
            strat(
                roles::RETURN_DATE,
                "return date field",
                &[
                    r#"input[placeholder*="Return"]"#,
                    r#"input[aria-label*="Return"]"#,
                    r#"input[data-testid*="return"]"#,
                ],
            ),
            strat(
                roles::SEARCH_BUTTON,
                "search submit button",
                &[
                    r#"button[aria-label*="Search"]"#,
                    r#"button[data-testid*="search"]"#,
                    r#"div[role="button"][aria-label*="Search"]"#,
                ],
            ),
            LocatorStrategy::new(
                roles::RESULTS_CONTAINER,
                "flight results list",
                [
                    r#"div[role="tabpanel"] ul li"#,
                    ".pIav2d",
                    ".Rk10dc li",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                results_timeout,
            ),
        ])
    }

    pub fn get(&self, role: &str) -> Option<&Arc<LocatorStrategy>> {
        self.strategies.get(role)
    }

    /// All strategies, for health aggregation.
    pub fn strategies(&self) -> impl Iterator<Item = &Arc<LocatorStrategy>> {
        self.strategies.values()
    }

    /// Resolve a role against a live page: try each expression in probe
    /// order, waiting up to the strategy's timeout for each. Returns the
    /// matching expression so callers can interact with the same element.
    pub async fn resolve(&self, driver: &dyn PageDriver, role: &str) -> ScrapeResult<String> {
        let strategy = self.strategies.get(role).ok_or_else(|| {
            ScrapeError::ElementNotFound {
                role: role.to_string(),
                description: "unregistered role".to_string(),
                attempted: Vec::new(),
            }
        })?;

        for idx in strategy.attempt_order() {
            let expr = &strategy.expressions[idx];
            match driver.wait_for(expr, strategy.timeout).await {
                Ok(true) => {
                    strategy.record_success(idx);
                    tracing::debug!(role, expr = expr.as_str(), "selector resolved");
                    return Ok(expr.clone());
                }
                Ok(false) => continue,
                Err(e) => {
                    tracing::debug!(role, expr = expr.as_str(), error = %e, "probe failed");
                    continue;
                }
            }
        }

        strategy.record_failure();
        tracing::warn!(role, "all selector expressions exhausted");
        Err(ScrapeError::ElementNotFound {
            role: strategy.role.clone(),
            description: strategy.description.clone(),
            attempted: strategy.expressions.clone(),
        })
    }
}

/// Logical UI role names used by the workflow.
pub mod roles {
    pub const ORIGIN_INPUT: &str = "origin_input";
    pub const DESTINATION_INPUT: &str = "destination_input";
    pub const DEPARTURE_DATE: &str = "departure_date";
    pub const RETURN_DATE: &str = "return_date";
    pub const SEARCH_BUTTON: &str = "search_button";
    pub const RESULTS_CONTAINER: &str = "results_container";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::ScriptedDriver;

    fn registry_with(role: &str, exprs: &[&str]) -> SelectorRegistry {
        SelectorRegistry::new(vec![LocatorStrategy::new(
            role,
            "test role",
            exprs.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(10),
        )])
    }

    #[tokio::test]
    async fn resolves_first_matching_expression_in_list_order() {
        let registry = registry_with("field", &["#a", "#b", "#c"]);
        // Both #b and #c match; #b must win because it comes first.
        let driver = ScriptedDriver::with_selectors(["#b", "#c"]);

        let expr = registry.resolve(&driver, "field").await.unwrap();
        assert_eq!(expr, "#b");

        let waits: Vec<_> = driver
            .actions()
            .into_iter()
            .filter(|a| a.starts_with("wait:"))
            .collect();
        assert_eq!(waits, vec!["wait:#a", "wait:#b"]);
    }

    #[tokio::test]
    async fn counters_account_for_every_attempt() {
        let registry = registry_with("field", &["#a", "#b"]);
        let hit = ScriptedDriver::with_selectors(["#a"]);
        let miss = ScriptedDriver::new();

        for _ in 0..3 {
            registry.resolve(&hit, "field").await.unwrap();
        }
        for _ in 0..2 {
            assert!(registry.resolve(&miss, "field").await.is_err());
        }

        let strategy = registry.get("field").unwrap();
        assert_eq!(strategy.success_count(), 3);
        assert_eq!(strategy.failure_count(), 2);
        assert_eq!(strategy.success_count() + strategy.failure_count(), 5);
        assert_eq!(strategy.last_success_index(), Some(0));
    }

    #[tokio::test]
    async fn last_successful_expression_is_probed_first() {
        let registry = registry_with("field", &["#a", "#b", "#c"]);
        let driver = ScriptedDriver::with_selectors(["#c"]);

        registry.resolve(&driver, "field").await.unwrap();
        assert_eq!(
            registry.get("field").unwrap().last_success_index(),
            Some(2)
        );

        // Second resolution should try #c before #a and #b.
        let driver2 = ScriptedDriver::with_selectors(["#c"]);
        registry.resolve(&driver2, "field").await.unwrap();
        let waits: Vec<_> = driver2
            .actions()
            .into_iter()
            .filter(|a| a.starts_with("wait:"))
            .collect();
        assert_eq!(waits, vec!["wait:#c"]);
    }

    #[tokio::test]
    async fn exhaustion_reports_role_and_attempted_expressions() {
        let registry = registry_with("origin_input", &["#a", "#b"]);
        let driver = ScriptedDriver::new();

        let err = registry.resolve(&driver, "origin_input").await.unwrap_err();
        match err {
            ScrapeError::ElementNotFound {
                role, attempted, ..
            } => {
                assert_eq!(role, "origin_input");
                assert_eq!(attempted, vec!["#a".to_string(), "#b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn success_rate_is_zero_without_attempts() {
        let strategy = LocatorStrategy::new(
            "field",
            "test",
            vec!["#a".to_string()],
            Duration::from_millis(10),
        );
        assert_eq!(strategy.success_rate(), 0.0);
    }

    #[test]
    fn default_registry_covers_all_workflow_roles() {
        let registry =
            SelectorRegistry::default_registry(Duration::from_secs(10), Duration::from_secs(30));
        for role in [
            roles::ORIGIN_INPUT,
            roles::DESTINATION_INPUT,
            roles::DEPARTURE_DATE,
            roles::RETURN_DATE,
            roles::SEARCH_BUTTON,
            roles::RESULTS_CONTAINER,
        ] {
            let strategy = registry.get(role).unwrap();
            assert!(!strategy.expressions().is_empty(), "empty role: {role}");
        }
        assert_eq!(
            registry.get(roles::RESULTS_CONTAINER).unwrap().timeout,
            Duration::from_secs(30)
        );
        assert_eq!(
            registry.get(roles::ORIGIN_INPUT).unwrap().timeout,
            Duration::from_secs(10)
        );
    }
}
