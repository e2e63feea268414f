//! Engine configuration with environment overrides.
//!
//! Every knob has a default matching observed site behavior; any of them
//! can be overridden through a `FARESCOPE_`-prefixed environment variable.

use std::time::Duration;

/// Target-site URLs.
#[derive(Debug, Clone)]
pub struct SiteUrls {
    pub one_way: String,
    pub round_trip: String,
    /// Plain landing page used when the parameterized URLs fail to load.
    pub fallback: String,
}

impl Default for SiteUrls {
    fn default() -> Self {
        Self {
            one_way: "https://www.google.com/travel/flights?tfs=CBwQARoAQAFIAXABggELCP___________wGYAQI"
                .to_string(),
            round_trip:
                "https://www.google.com/travel/flights?tfs=CBwQARoOagwIAhIIL20vMGQ5anIaDnIMCAISCC9tLzBkOWpyQAFIAXABggELCP___________wGYAQE"
                    .to_string(),
            fallback: "https://www.google.com/travel/flights".to_string(),
        }
    }
}

/// Thresholds for the health classification in [`crate::health`].
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    /// Below this overall success rate the engine is degraded.
    pub degraded_below: f64,
    /// Below this overall success rate the engine is critical.
    pub critical_below: f64,
    /// Per-role low-water mark; roles under it are reported as issues.
    pub role_low_water: f64,
    /// Trailing window for operation-level failure rates.
    pub window: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_below: 0.8,
            critical_below: 0.5,
            role_low_water: 0.5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// All tunables for the extraction engine.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Extra Chromium launch arguments (stealth flags included).
    pub browser_args: Vec<String>,
    /// Bound on browser process startup.
    pub session_init_timeout: Duration,
    /// Bound on a single page navigation.
    pub navigation_timeout: Duration,
    /// Per-attempt bound when resolving one selector expression.
    pub element_timeout: Duration,
    /// Bound on waiting for the results list to render after submit.
    pub results_timeout: Duration,
    /// Per-step retry bound for workflow transitions.
    pub step_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
    /// Human-like pause range between interactions.
    pub delay_range: (Duration, Duration),
    /// Maximum concurrent browser sessions.
    pub max_sessions: usize,
    /// Searches allowed per rate-limit window.
    pub rate_limit: usize,
    pub rate_window: Duration,
    /// Absolute bound on waiting for rate-limit clearance.
    pub rate_max_wait: Duration,
    pub cache_ttl: Duration,
    pub urls: SiteUrls,
    pub health: HealthThresholds,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            viewport: (1366, 768),
            browser_args: vec![
                "--headless=new".to_string(),
                "--no-sandbox".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-extensions".to_string(),
                "--disable-background-networking".to_string(),
            ],
            session_init_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(60),
            element_timeout: Duration::from_secs(10),
            results_timeout: Duration::from_secs(25),
            step_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            delay_range: (Duration::from_millis(2000), Duration::from_millis(5000)),
            max_sessions: 2,
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            rate_max_wait: Duration::from_secs(120),
            cache_ttl: Duration::from_secs(300),
            urls: SiteUrls::default(),
            health: HealthThresholds::default(),
        }
    }
}

impl ScraperConfig {
    /// Defaults overridden by `FARESCOPE_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(ua) = std::env::var("FARESCOPE_USER_AGENT") {
            cfg.user_agent = ua;
        }
        if let Some(secs) = env_u64("FARESCOPE_SESSION_TIMEOUT_SECS") {
            cfg.session_init_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FARESCOPE_NAVIGATION_TIMEOUT_SECS") {
            cfg.navigation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FARESCOPE_ELEMENT_TIMEOUT_SECS") {
            cfg.element_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("FARESCOPE_STEP_RETRIES") {
            cfg.step_retries = n as u32;
        }
        if let Some(n) = env_u64("FARESCOPE_MAX_SESSIONS") {
            cfg.max_sessions = (n as usize).max(1);
        }
        if let Some(n) = env_u64("FARESCOPE_RATE_LIMIT") {
            cfg.rate_limit = (n as usize).max(1);
        }
        if let Some(secs) = env_u64("FARESCOPE_RATE_WINDOW_SECS") {
            cfg.rate_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("FARESCOPE_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        cfg
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
