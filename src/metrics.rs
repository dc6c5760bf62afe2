use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCounts {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rate_limited: u64,
}

/// Process-lifetime counters, shared through the application state.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rate_limited: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.inner.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, success: bool) {
        let counter = if success {
            &self.inner.succeeded
        } else {
            &self.inner.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.inner.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.inner.total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RequestCounts {
        RequestCounts {
            total: self.inner.total.load(Ordering::Relaxed),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            rate_limited: self.inner.rate_limited.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_shared_between_clones() {
        let metrics = RequestMetrics::new();
        let clone = metrics.clone();

        metrics.record_request();
        clone.record_request();
        clone.record_outcome(true);
        metrics.record_outcome(false);
        metrics.record_rate_limited();

        assert_eq!(
            metrics.snapshot(),
            RequestCounts {
                total: 2,
                succeeded: 1,
                failed: 1,
                rate_limited: 1,
            }
        );
        assert_eq!(clone.request_count(), 2);
    }
}
