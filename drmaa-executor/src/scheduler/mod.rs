//! Scheduler layer for the executor
//!
//! This layer reconciles tracked jobs with the DRM. The host drives it: every
//! poll tick hands the active jobs to the poller and receives back the ones
//! that are still running. Status queries share one rate limiter.

pub mod poller;
pub mod rate_limiter;

pub use poller::{PollOutcome, StatusPoller};
pub use rate_limiter::StatusRateLimiter;
