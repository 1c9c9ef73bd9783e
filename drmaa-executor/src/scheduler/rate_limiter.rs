//! Status query rate limiter
//!
//! Sliding-window limiter shared by every tracked job. At most `max_calls`
//! acquisitions are granted within any window of length `period`; callers
//! beyond that sleep until the oldest grant leaves the window.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::time::{self, Duration, Instant};

/// Bounds how often the DRM is asked for job states
#[derive(Debug)]
pub struct StatusRateLimiter {
    max_calls: usize,
    period: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl StatusRateLimiter {
    /// Creates a limiter granting `max_calls` per `period`
    ///
    /// A limit of zero is treated as one.
    pub fn new(max_calls: u32, period: Duration) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            max_calls,
            period,
            grants: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Creates a limiter granting `max_calls` per second
    pub fn per_second(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(1))
    }

    /// Waits until a call may be made and records it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                while grants
                    .front()
                    .is_some_and(|&granted| now.duration_since(granted) >= self.period)
                {
                    grants.pop_front();
                }

                if grants.len() < self.max_calls {
                    grants.push_back(now);
                    return;
                }

                grants
                    .front()
                    .map(|&oldest| (oldest + self.period).saturating_duration_since(now))
                    .unwrap_or_default()
            };

            time::sleep(wait).await;
        }
    }
}
