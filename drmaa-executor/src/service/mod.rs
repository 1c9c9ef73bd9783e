//! Service layer
//!
//! Services contain the executor's job handling outside of polling:
//! submitting jobs, cancelling them and removing their jobscripts.

mod cancellation;
mod cleanup;
mod submission;

pub use cancellation::cancel_jobs;
pub use cleanup::JobscriptCleaner;
pub use submission::JobSubmitter;
