use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::time::Duration;

/// Minimum-interval gate in front of outbound fetcher requests.
///
/// The first call passes immediately; each later call waits until `interval`
/// has elapsed since the previous one was let through. A zero interval
/// disables pacing.
pub struct Pacer {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(interval).map(RateLimiter::direct),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    pub async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
