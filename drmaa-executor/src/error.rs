//! Error types for the executor

use drmaa_client::DrmaaError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Errors raised by the executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The DRMAA session could not be established
    #[error("Error loading drmaa support: {0}")]
    Session(#[source] DrmaaError),

    /// A job-level problem reported against the rule it came from
    #[error("Error in rule {rule}: {message}")]
    Workflow { rule: String, message: String },

    /// The DRM rejected a submission
    #[error("Error submitting job {jobid} (DRMAA error {source})")]
    Submission {
        jobid: u64,
        #[source]
        source: DrmaaError,
    },

    /// Unclassified session failure
    #[error("DRMAA error: {0}")]
    Drmaa(#[from] DrmaaError),

    /// Terminating a job failed for a reason other than the job being gone
    #[error("Failed to cancel DRMAA job {jobid}: {source}")]
    Cancellation {
        jobid: String,
        #[source]
        source: DrmaaError,
    },

    /// The log directory could not be created
    #[error("Failed to create log directory {}: {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transient jobscript could not be removed
    #[error("Failed to remove jobscript {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings failed validation
    #[error("Invalid executor settings: {0}")]
    Config(String),
}

impl ExecutorError {
    /// Check if this error only affects a single job
    ///
    /// The executor keeps working after task-scoped errors; anything else
    /// means the executor itself is in trouble. A jobscript that could not be
    /// removed is only ever surfaced under [`ArtifactCleanup::Propagate`],
    /// so it counts as an executor failure.
    ///
    /// [`ArtifactCleanup::Propagate`]: crate::config::ArtifactCleanup::Propagate
    pub fn is_task_scoped(&self) -> bool {
        matches!(self, Self::Workflow { .. } | Self::Submission { .. })
    }
}
