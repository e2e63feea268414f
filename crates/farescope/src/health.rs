//! Operation metrics and health aggregation.
//!
//! Every orchestrated search appends one metric; health is computed over a
//! sliding time window from those entries plus the per-role selector
//! counters, so a freshly reshuffled site shows up as degraded selectors
//! before it shows up as failed searches.

use crate::config::HealthThresholds;
use crate::selectors::SelectorRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct OperationMetric {
    pub operation: String,
    pub success: bool,
    pub duration: Duration,
    /// Free-form context, e.g. the search fingerprint.
    pub metadata: Option<serde_json::Value>,
    recorded: Instant,
}

/// Append-only metric log shared across sessions.
#[derive(Default)]
pub struct MetricsLog {
    entries: Mutex<Vec<OperationMetric>>,
}

impl MetricsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(
        &self,
        operation: &str,
        success: bool,
        duration: Duration,
        metadata: Option<serde_json::Value>,
    ) {
        self.entries.lock().await.push(OperationMetric {
            operation: operation.to_string(),
            success,
            duration,
            metadata,
            recorded: Instant::now(),
        });
    }

    /// (successes, total) within the trailing `window`.
    pub async fn window_counts(&self, window: Duration) -> (usize, usize) {
        let cutoff = Instant::now().checked_sub(window);
        let entries = self.entries.lock().await;
        let in_window = entries
            .iter()
            .filter(|m| cutoff.map_or(true, |c| m.recorded >= c));
        let mut successes = 0;
        let mut total = 0;
        for metric in in_window {
            total += 1;
            if metric.success {
                successes += 1;
            }
        }
        (successes, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

/// Selector health for one UI role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleHealth {
    pub role: String,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Search success rate over the window; 1.0 when nothing ran yet.
    pub success_rate: f64,
    pub operations_in_window: usize,
    pub roles: Vec<RoleHealth>,
    pub generated_at: DateTime<Utc>,
}

pub struct HealthMonitor {
    log: MetricsLog,
    thresholds: HealthThresholds,
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            log: MetricsLog::new(),
            thresholds,
        }
    }

    pub fn log(&self) -> &MetricsLog {
        &self.log
    }

    /// Aggregate the windowed operation log and per-role selector counters
    /// into one status. Degraded selectors cap the status at `Degraded`
    /// even while overall searches still succeed.
    pub async fn report(&self, registry: &SelectorRegistry) -> HealthReport {
        let (successes, total) = self.log.window_counts(self.thresholds.window).await;
        let success_rate = if total == 0 {
            1.0
        } else {
            successes as f64 / total as f64
        };

        let mut roles: Vec<RoleHealth> = registry
            .strategies()
            .map(|s| {
                let attempts = s.success_count() + s.failure_count();
                RoleHealth {
                    role: s.role.clone(),
                    successes: s.success_count(),
                    failures: s.failure_count(),
                    success_rate: s.success_rate(),
                    degraded: attempts > 0 && s.success_rate() < self.thresholds.role_low_water,
                }
            })
            .collect();
        roles.sort_by(|a, b| a.role.cmp(&b.role));

        let status = if total > 0 && success_rate < self.thresholds.critical_below {
            HealthStatus::Critical
        } else if total > 0 && success_rate < self.thresholds.degraded_below {
            HealthStatus::Degraded
        } else if roles.iter().any(|r| r.degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            success_rate,
            operations_in_window: total,
            roles,
            generated_at: Utc::now(),
        }
    }
}
