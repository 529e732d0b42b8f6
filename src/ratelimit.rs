//! Per-client-IP throttling for the public signup endpoint.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use crate::config::RateLimitConfig;

/// Outcome of accounting one request against the caller's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Request-budget accounting keyed by client IP. The in-process
/// implementation below serves a single instance; a multi-instance
/// deployment plugs a shared backend in behind the same trait.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Account for one request from `ip` and decide whether it may proceed.
    async fn check(&self, ip: IpAddr) -> RateDecision;

    /// Drop expired bookkeeping. Implementations without local state can
    /// ignore this.
    async fn prune(&self) {}
}

/// Counter for one client IP within the current window.
#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window limiter: `max_requests` per `window` per IP, counter reset
/// when the window elapses.
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: config.window(),
            max_requests: config.max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_sync(&self, ip: IpAddr) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let window = windows.entry(ip).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        window.count += 1;
        if window.count > self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(window.started_at));
            warn!(ip = %ip, count = window.count, "rate limit exceeded");
            RateDecision::Limited { retry_after }
        } else {
            RateDecision::Allowed {
                remaining: self.max_requests - window.count,
            }
        }
    }

    fn prune_sync(&self) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, window| window.started_at.elapsed() < self.window);
    }
}

#[async_trait]
impl RateLimit for FixedWindowLimiter {
    async fn check(&self, ip: IpAddr) -> RateDecision {
        self.check_sync(ip)
    }

    async fn prune(&self) {
        self.prune_sync();
    }
}
