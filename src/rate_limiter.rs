use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ApiError;

/// Fixed window rate limiter keyed by client IP.
///
/// Counters live in process memory only; a restart resets every window.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u64,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, WindowCounter>>>,
}

/// Request count for one client within the current window
#[derive(Debug, Clone)]
struct WindowCounter {
    count: u64,
    window_start: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Time until the current window resets
    pub reset_after: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request for `key` at the current instant
    pub fn check(&self, key: &str) -> Result<RateLimitDecision, ApiError> {
        self.check_at(key, Instant::now())
    }

    /// Count a request for `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> Result<RateLimitDecision, ApiError> {
        let mut windows = self.windows.lock().map_err(|_| {
            ApiError::Internal("Failed to acquire lock on rate limit windows".to_string())
        })?;

        let counter = windows
            .entry(key.to_string())
            .or_insert_with(|| WindowCounter {
                count: 0,
                window_start: now,
            });

        if now.saturating_duration_since(counter.window_start) >= self.window {
            counter.count = 0;
            counter.window_start = now;
        }

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(counter.window_start));

        if counter.count >= self.max_requests {
            return Ok(RateLimitDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after,
            });
        }

        counter.count += 1;
        Ok(RateLimitDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - counter.count,
            reset_after,
        })
    }

    /// Drop counters whose window has already elapsed. Such counters would be
    /// reset on next use anyway, so this never changes a decision.
    pub fn purge_expired(&self, now: Instant) -> Result<usize, ApiError> {
        let mut windows = self.windows.lock().map_err(|_| {
            ApiError::Internal("Failed to acquire lock on rate limit windows".to_string())
        })?;

        let initial_count = windows.len();
        windows.retain(|_, counter| {
            now.saturating_duration_since(counter.window_start) < self.window
        });

        Ok(initial_count - windows.len())
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().map(|windows| windows.len()).unwrap_or(0)
    }
}
