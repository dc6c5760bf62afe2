use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Instant;

use crate::config::Config;
use crate::metrics::RequestMetrics;
use crate::response::HealthResponse;

/// Builds `/health` snapshots from the process start time and counters.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    started_at: Instant,
    metrics: RequestMetrics,
}

impl HealthChecker {
    pub fn new(metrics: RequestMetrics) -> Self {
        Self::started_at(Instant::now(), metrics)
    }

    pub fn started_at(started_at: Instant, metrics: RequestMetrics) -> Self {
        Self {
            started_at,
            metrics,
        }
    }

    pub fn check_health(&self, config: &Config) -> HealthResponse {
        self.check_health_at(config, Utc::now(), Instant::now())
    }

    fn check_health_at(
        &self,
        config: &Config,
        timestamp: DateTime<Utc>,
        now: Instant,
    ) -> HealthResponse {
        HealthResponse {
            status: "OK".to_string(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: now.saturating_duration_since(self.started_at).as_secs_f64(),
            request_count: self.metrics.request_count(),
            requests: self.metrics.snapshot(),
            has_custom_api_key: config.has_custom_api_key(),
            environment: config.environment.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
