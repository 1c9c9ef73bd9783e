//! DRMAA Executor
//!
//! Dispatches a host's jobs to a distributed resource manager through a
//! [`drmaa_client::DrmSession`] and keeps track of them until they finish.
//!
//! Architecture:
//! - Configuration: [`ExecutorSettings`], from the command line or environment
//! - Session: opened once by the executor and closed on shutdown
//! - Services: submission, cancellation and jobscript cleanup
//! - Scheduler: rate-limited reconciliation of tracked jobs
//!
//! The host submits jobs with [`DrmaaExecutor::run_job`], hands the tracked
//! jobs back on every poll tick and receives the outcome of each job through
//! its [`JobReporter`].

pub mod config;
pub mod error;
pub mod executor;
pub mod reporter;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod template;

pub use config::{ArtifactCleanup, ExecutorSettings};
pub use error::{ExecutorError, Result};
pub use executor::{DrmaaExecutor, shell_quote};
pub use reporter::JobReporter;
pub use scheduler::PollOutcome;
