//! Session trait
//!
//! The operations the executor needs from a DRMAA implementation. Calls are
//! synchronous: the DRMAA C API blocks, and the executor decides where to
//! yield.

use drmaa_core::{JobControlAction, JobState, JobTemplate, RemoteJobId, TemplateId};

use crate::error::Result;

/// A connection to a distributed resource manager
pub trait DrmSession: Send + Sync {
    /// Opens the session
    ///
    /// Returns [`DrmaaError::AlreadyActiveSession`](crate::DrmaaError::AlreadyActiveSession)
    /// when the session is already open.
    fn initialize(&self) -> Result<()>;

    /// Closes the session. Jobs already submitted keep running.
    fn exit(&self) -> Result<()>;

    /// Allocates a job template
    fn create_job_template(&self) -> Result<TemplateId>;

    /// Releases a template allocated with [`DrmSession::create_job_template`]
    fn delete_job_template(&self, id: TemplateId) -> Result<()>;

    /// Submits a job described by `template`
    fn run_job(&self, template: &JobTemplate) -> Result<RemoteJobId>;

    /// Queries the current state of a submitted job
    fn job_status(&self, job_id: &RemoteJobId) -> Result<JobState>;

    /// Applies a control action to a submitted job
    fn control(&self, job_id: &RemoteJobId, action: JobControlAction) -> Result<()>;
}
