//! Error types for DRMAA sessions

use drmaa_core::JobControlAction;
use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, DrmaaError>;

/// Errors reported by a DRMAA session
///
/// Each variant corresponds to one error class of the DRMAA specification,
/// so callers can match on the class instead of parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrmaaError {
    /// `initialize` was called on a session that is already active
    #[error("Session is already active")]
    AlreadyActiveSession,

    /// An operation needs an active session
    #[error("No active session")]
    NoActiveSession,

    /// The DRM rejected the request, typically for lack of permissions
    #[error("Denied by DRM: {0}")]
    DeniedByDrm(String),

    /// Unexpected failure inside the DRMAA implementation
    #[error("Internal error: {0}")]
    Internal(String),

    /// A template attribute has a value the DRM does not accept
    #[error("Invalid attribute value: {0}")]
    InvalidAttributeValue(String),

    /// An argument such as a template id is not valid for this session
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The job id is unknown or the job no longer exists
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// The status or wait call timed out before the job reached a state
    #[error("Exit timeout")]
    ExitTimeout,

    /// The DRM could not be reached
    #[error("DRM communication failure: {0}")]
    DrmCommunication(String),

    /// The session does not implement the requested control action
    #[error("Unsupported control action: {0}")]
    Unsupported(JobControlAction),
}

impl DrmaaError {
    /// Check if this error is one the DRM raises to reject a submission
    pub fn is_submission_rejection(&self) -> bool {
        matches!(
            self,
            Self::DeniedByDrm(_) | Self::Internal(_) | Self::InvalidAttributeValue(_)
        )
    }

    /// Check if this error is expected when terminating a job that is
    /// already gone or while the DRM is in a transient state
    pub fn is_ignorable_on_cancel(&self) -> bool {
        matches!(self, Self::InvalidJob(_) | Self::Internal(_))
    }
}
