//! Page driver abstraction over the browser engine.
//!
//! The `PageDriver` trait is the seam between the workflow logic and
//! chromiumoxide: navigation, element waits, and interactions go through it
//! so the navigator and extraction pipeline can be exercised against a
//! scripted driver in tests.

use crate::types::{ScrapeError, ScrapeResult};
use async_trait::async_trait;
use chromiumoxide::page::Page;
use serde_json::Value;
use std::time::Duration;

/// A live page handle the workflow can drive.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> ScrapeResult<()>;

    /// Wait up to `timeout` for a selector to match. Returns whether it did;
    /// absence is a normal outcome here, not an error.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> ScrapeResult<bool>;

    /// Focus the matching element and type `value` into it.
    async fn fill(&self, selector: &str, value: &str) -> ScrapeResult<()>;

    /// Click the matching element.
    async fn click(&self, selector: &str) -> ScrapeResult<()>;

    /// Press a key (e.g. "Enter") on the matching element.
    async fn press_key(&self, selector: &str, key: &str) -> ScrapeResult<()>;

    /// Evaluate JavaScript in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> ScrapeResult<Value>;

    /// Current page URL.
    async fn current_url(&self) -> ScrapeResult<String>;
}

/// `PageDriver` over a chromiumoxide [`Page`].
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    fn browser_err(e: impl std::fmt::Display) -> ScrapeError {
        ScrapeError::Browser(e.to_string())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> ScrapeResult<()> {
        let nav = tokio::time::timeout(timeout, self.page.goto(url)).await;
        match nav {
            Ok(Ok(_)) => {
                // Best effort: the DOM may keep mutating after load, callers
                // wait for concrete selectors instead of network idle.
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(Self::browser_err(e)),
            Err(_) => Err(ScrapeError::Timeout {
                operation: format!("navigate to {url}"),
                limit: timeout,
            }),
        }
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> ScrapeResult<bool> {
        let sel = serde_json::to_string(selector).map_err(Self::browser_err)?;
        let budget_ms = timeout.as_millis() as u64;
        // Polling promise that always resolves a bool, so a missing element
        // never surfaces as a JS exception.
        let script = format!(
            r#"new Promise((resolve) => {{
                const sel = {sel};
                const deadline = Date.now() + {budget_ms};
                const tick = () => {{
                    if (document.querySelector(sel)) return resolve(true);
                    if (Date.now() >= deadline) return resolve(false);
                    setTimeout(tick, 100);
                }};
                tick();
            }})"#
        );

        // Outer timeout guards against the tab itself hanging.
        let result = tokio::time::timeout(
            timeout + Duration::from_secs(2),
            self.page.evaluate(script),
        )
        .await
        .map_err(|_| ScrapeError::Timeout {
            operation: format!("wait for {selector}"),
            limit: timeout,
        })?
        .map_err(Self::browser_err)?;

        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    async fn fill(&self, selector: &str, value: &str) -> ScrapeResult<()> {
        let el = self
            .page
            .find_element(selector)
            .await
            .map_err(Self::browser_err)?;
        el.click().await.map_err(Self::browser_err)?;
        el.type_str(value).await.map_err(Self::browser_err)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> ScrapeResult<()> {
        let el = self
            .page
            .find_element(selector)
            .await
            .map_err(Self::browser_err)?;
        el.click().await.map_err(Self::browser_err)?;
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> ScrapeResult<()> {
        let el = self
            .page
            .find_element(selector)
            .await
            .map_err(Self::browser_err)?;
        el.press_key(key).await.map_err(Self::browser_err)?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> ScrapeResult<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(Self::browser_err)?;
        result
            .into_value()
            .map_err(|e| ScrapeError::Browser(format!("JS result conversion failed: {e:?}")))
    }

    async fn current_url(&self) -> ScrapeResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(Self::browser_err)?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }
}
