//! Browser session lifecycle.
//!
//! A session is one headless browser with one page, configured to look like
//! an ordinary desktop Chrome. The manager bounds concurrency with a
//! semaphore and bounds startup with a hard timeout so a wedged browser
//! launch surfaces as a structured failure instead of a hang.

use crate::config::ScraperConfig;
use crate::driver::{ChromiumPage, PageDriver};
use crate::types::{ScrapeError, ScrapeResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Injected before any site script runs so automation fingerprints read
/// like a regular browser.
const STEALTH_INIT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// A live scraping session handed out by a [`SessionProvider`].
#[async_trait]
pub trait PageSession: Send + Sync {
    fn driver(&self) -> &dyn PageDriver;

    /// Tear the session down. Dropping without calling this still releases
    /// the browser, just without waiting for a clean shutdown.
    async fn close(self: Box<Self>) -> ScrapeResult<()>;
}

/// Source of sessions, as a seam so the orchestrator can run against a
/// scripted provider in tests.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> ScrapeResult<Box<dyn PageSession>>;
}

pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    driver: ChromiumPage,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl PageSession for BrowserSession {
    fn driver(&self) -> &dyn PageDriver {
        &self.driver
    }

    async fn close(mut self: Box<Self>) -> ScrapeResult<()> {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Unclean path (caller dropped the future): stop the CDP event loop,
        // which severs the connection and lets the browser process exit.
        self.handler_task.abort();
    }
}

/// Launches stealth-configured browsers, at most `max_sessions` at a time.
pub struct SessionManager {
    config: Arc<ScraperConfig>,
    slots: Arc<Semaphore>,
    started: AtomicU64,
}

impl SessionManager {
    pub fn new(config: Arc<ScraperConfig>) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_sessions.max(1)));
        Self {
            config,
            slots,
            started: AtomicU64::new(0),
        }
    }

    /// Total sessions launched over the manager's lifetime.
    pub fn sessions_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    fn executable() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FARESCOPE_BROWSER") {
            return Some(PathBuf::from(path));
        }
        ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
            .iter()
            .find_map(|name| which::which(name).ok())
    }

    fn browser_config(&self) -> ScrapeResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.viewport.0, self.config.viewport.1)
            .args(self.config.browser_args.iter().map(String::as_str));
        if let Some(path) = Self::executable() {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| ScrapeError::SessionInit(format!("browser config rejected: {e}")))
    }

    async fn launch(&self, permit: OwnedSemaphorePermit) -> ScrapeResult<BrowserSession> {
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| ScrapeError::SessionInit(format!("browser launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::SessionInit(format!("page creation failed: {e}")))?;
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| ScrapeError::SessionInit(format!("user agent rejected: {e}")))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_INIT))
            .await
            .map_err(|e| ScrapeError::SessionInit(format!("stealth init failed: {e}")))?;

        self.started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(total = self.sessions_started(), "browser session started");

        Ok(BrowserSession {
            browser,
            handler_task,
            driver: ChromiumPage::new(page),
            _permit: permit,
        })
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn acquire(&self) -> ScrapeResult<Box<dyn PageSession>> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScrapeError::SessionInit("session pool closed".to_string()))?;

        match tokio::time::timeout(self.config.session_init_timeout, self.launch(permit)).await {
            Ok(session) => Ok(Box::new(session?)),
            Err(_) => Err(ScrapeError::SessionInit(format!(
                "browser did not start within {:?}",
                self.config.session_init_timeout
            ))),
        }
    }
}
