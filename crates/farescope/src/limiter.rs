//! Request pacing and result caching.
//!
//! The limiter enforces a sliding-window request budget against the target
//! site; the cache short-circuits repeat searches inside a TTL so they
//! consume neither a browser session nor a limiter slot.

use crate::types::{ScrapeError, ScrapeResult, ScrapingResult};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sliding-window rate limiter: at most `max_requests` starts per `window`.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    max_wait: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration, max_wait: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            max_wait,
            stamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Take one slot, suspending until the window frees one. Gives up with
    /// `RateLimitTimeout` once the absolute deadline passes, so a saturated
    /// window cannot queue callers indefinitely.
    pub async fn acquire(&self) -> ScrapeResult<()> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let wait = {
                let mut stamps = self.stamps.lock().await;
                let now = Instant::now();
                while stamps
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.window)
                {
                    stamps.pop_front();
                }
                if stamps.len() < self.max_requests {
                    stamps.push_back(now);
                    return Ok(());
                }
                // Slot frees when the oldest stamp ages out.
                let oldest = *stamps.front().unwrap_or(&now);
                self.window.saturating_sub(now.duration_since(oldest))
            };

            if Instant::now() + wait > deadline {
                tracing::warn!(max_wait = ?self.max_wait, "rate limit wait exceeded");
                return Err(ScrapeError::RateLimitTimeout(self.max_wait));
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Slots currently consumed within the window.
    pub async fn in_flight(&self) -> usize {
        let mut stamps = self.stamps.lock().await;
        let now = Instant::now();
        while stamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            stamps.pop_front();
        }
        stamps.len()
    }
}

/// TTL cache of completed search results keyed by criteria fingerprint.
/// Entries are stored immutably; re-inserting a key replaces the entry and
/// restarts its TTL.
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, ScrapingResult)>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<ScrapingResult> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((stored, _)) if stored.elapsed() >= self.ttl => {
                entries.remove(key);
                None
            }
            Some((_, result)) => Some(result.clone()),
            None => None,
        }
    }

    pub async fn insert(&self, key: String, result: ScrapingResult) {
        self.entries
            .lock()
            .await
            .insert(key, (Instant::now(), result));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchCriteria;
    use chrono::NaiveDate;

    fn sample_result(price_count: usize) -> ScrapingResult {
        let criteria = SearchCriteria::one_way(
            "JFK",
            "LAX",
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
        );
        let mut result = ScrapingResult::failed(criteria, "unused".into(), Duration::ZERO);
        result.success = true;
        result.error_message = None;
        result.total_results = price_count;
        result
    }

    #[tokio::test]
    async fn allows_burst_up_to_the_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60), Duration::from_millis(5));
        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(limiter.in_flight().await, 3);
    }

    #[tokio::test]
    async fn saturated_window_times_out_with_rate_error() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60), Duration::from_millis(5));
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();

        let err = limiter.acquire().await.unwrap_err();
        assert!(matches!(err, ScrapeError::RateLimitTimeout(_)));
        assert!(err.to_string().starts_with("RateLimitTimeout:"), "got {err}");
    }

    #[tokio::test]
    async fn slot_frees_after_the_window_passes() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20), Duration::from_millis(200));
        limiter.acquire().await.unwrap();
        // Second acquire must suspend until the first stamp ages out.
        let started = Instant::now();
        limiter.acquire().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn cache_hit_within_ttl_and_miss_after() {
        let cache = ResultCache::new(Duration::from_millis(30));
        cache.insert("key".into(), sample_result(2)).await;

        let hit = cache.get("key").await.unwrap();
        assert_eq!(hit.total_results, 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("key").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn reinsert_replaces_entry_and_restarts_ttl() {
        let cache = ResultCache::new(Duration::from_millis(50));
        cache.insert("key".into(), sample_result(1)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.insert("key".into(), sample_result(5)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        // 60ms after the first insert but only 30ms after the second.
        let hit = cache.get("key").await.unwrap();
        assert_eq!(hit.total_results, 5);
    }
}
