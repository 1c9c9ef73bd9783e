//! Remote job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::task::{JobHandle, WorkflowJob};

/// Identifier assigned by the DRM when a job is submitted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteJobId(String);

impl RemoteJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job state as reported by the DRM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Undetermined,
    QueuedActive,
    SystemOnHold,
    UserOnHold,
    UserSystemOnHold,
    Running,
    SystemSuspended,
    UserSuspended,
    UserSystemSuspended,
    Done,
    Failed,
}

/// Who suspended a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendedBy {
    User,
    System,
    UserAndSystem,
}

impl fmt::Display for SuspendedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspendedBy::User => write!(f, "user"),
            SuspendedBy::System => write!(f, "system"),
            SuspendedBy::UserAndSystem => write!(f, "user and system"),
        }
    }
}

impl JobState {
    /// Returns true once the DRM will not change this state again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Returns the suspension cause if the job is currently suspended
    pub fn suspended_by(self) -> Option<SuspendedBy> {
        match self {
            JobState::UserSuspended => Some(SuspendedBy::User),
            JobState::SystemSuspended => Some(SuspendedBy::System),
            JobState::UserSystemSuspended => Some(SuspendedBy::UserAndSystem),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Undetermined => "undetermined",
            JobState::QueuedActive => "queued_active",
            JobState::SystemOnHold => "system_on_hold",
            JobState::UserOnHold => "user_on_hold",
            JobState::UserSystemOnHold => "user_system_on_hold",
            JobState::Running => "running",
            JobState::SystemSuspended => "system_suspended",
            JobState::UserSuspended => "user_suspended",
            JobState::UserSystemSuspended => "user_system_suspended",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Control actions accepted by the DRM for a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobControlAction {
    Suspend,
    Resume,
    Hold,
    Release,
    Terminate,
}

impl fmt::Display for JobControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobControlAction::Suspend => write!(f, "suspend"),
            JobControlAction::Resume => write!(f, "resume"),
            JobControlAction::Hold => write!(f, "hold"),
            JobControlAction::Release => write!(f, "release"),
            JobControlAction::Terminate => write!(f, "terminate"),
        }
    }
}

/// A job that was handed to the DRM and is being tracked
///
/// Owned by value: the reconciler consumes entries and hands back only the
/// ones that are still active. Dropping an entry ends its tracking.
#[derive(Debug)]
pub struct SubmittedJob {
    job: JobHandle,
    external_jobid: RemoteJobId,
    jobscript: PathBuf,
    submitted_at: DateTime<Utc>,
}

impl SubmittedJob {
    pub fn new(job: JobHandle, external_jobid: RemoteJobId, jobscript: PathBuf) -> Self {
        Self {
            job,
            external_jobid,
            jobscript,
            submitted_at: Utc::now(),
        }
    }

    /// The host's handle for this job
    pub fn job(&self) -> &Arc<dyn WorkflowJob> {
        &self.job
    }

    pub fn jobid(&self) -> u64 {
        self.job.jobid()
    }

    pub fn external_jobid(&self) -> &RemoteJobId {
        &self.external_jobid
    }

    /// Transient jobscript to remove once the job leaves tracking
    pub fn jobscript(&self) -> &Path {
        &self.jobscript
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
