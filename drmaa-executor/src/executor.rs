//! DRMAA executor
//!
//! [`DrmaaExecutor`] is what a host talks to. It owns the session for its
//! whole lifetime and wires the submission, polling and cancellation
//! services to it.

use drmaa_client::DrmSession;
use drmaa_core::{JobHandle, SubmittedJob};
use futures::stream::Stream;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::ExecutorSettings;
use crate::error::Result;
use crate::reporter::JobReporter;
use crate::scheduler::{PollOutcome, StatusPoller, StatusRateLimiter};
use crate::service::{self, JobSubmitter, JobscriptCleaner};
use crate::session::SessionHandle;
use crate::template::TemplateBuilder;

/// Dispatches host jobs to a DRM
pub struct DrmaaExecutor {
    settings: ExecutorSettings,
    submitter: JobSubmitter,
    poller: StatusPoller,
    handle: SessionHandle,
}

impl DrmaaExecutor {
    /// Validates `settings` and opens `session`
    ///
    /// # Arguments
    /// * `settings` - Executor settings
    /// * `session` - The DRM session jobs are submitted through
    /// * `reporter` - Receives job lifecycle reports
    pub fn new(
        settings: ExecutorSettings,
        session: Arc<dyn DrmSession>,
        reporter: Arc<dyn JobReporter>,
    ) -> Result<Self> {
        settings.validate()?;
        let builder = TemplateBuilder::new(&settings)?;
        let handle = SessionHandle::open(session.clone())?;

        let cleaner = JobscriptCleaner::new(settings.artifact_cleanup);
        let limiter = Arc::new(StatusRateLimiter::per_second(
            settings.max_status_checks_per_second,
        ));

        info!(
            "DRMAA executor ready: max {} status checks per second, artifact cleanup {:?}",
            settings.max_status_checks_per_second, settings.artifact_cleanup
        );

        Ok(Self {
            submitter: JobSubmitter::new(session.clone(), builder, reporter.clone(), cleaner),
            poller: StatusPoller::new(session, reporter, limiter, cleaner),
            settings,
            handle,
        })
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Submits `jobscript` for `job`, see [`JobSubmitter::submit`]
    pub fn run_job(&self, job: JobHandle, jobscript: PathBuf) -> Result<SubmittedJob> {
        self.submitter.submit(job, jobscript)
    }

    /// Checks tracked jobs once, see [`StatusPoller::check_active_jobs`]
    pub fn check_active_jobs(
        &self,
        active: Vec<SubmittedJob>,
    ) -> impl Stream<Item = Result<SubmittedJob>> + '_ {
        self.poller.check_active_jobs(active)
    }

    /// Checks tracked jobs once and collects the outcome
    pub async fn poll_active_jobs(&self, active: Vec<SubmittedJob>) -> PollOutcome {
        self.poller.poll_active_jobs(active).await
    }

    /// Returns true if the job was suspended when it was last checked
    pub fn is_suspended(&self, jobid: u64) -> bool {
        self.poller.is_suspended(jobid)
    }

    /// Terminates every job in `active`
    pub fn cancel_jobs(&self, active: Vec<SubmittedJob>) -> Result<()> {
        service::cancel_jobs(self.handle.session().as_ref(), active)
    }

    /// Command jobscripts run before the job itself
    ///
    /// Changes into the common working directory when one is configured.
    pub fn job_exec_prefix(&self) -> String {
        match &self.settings.common_workdir {
            Some(dir) => format!("cd {}", shell_quote(&dir.to_string_lossy())),
            None => String::new(),
        }
    }

    /// Releases the session
    ///
    /// Taking the executor by value guarantees that no status stream is
    /// still borrowing it.
    pub fn shutdown(self) -> Result<()> {
        info!("Shutting down DRMAA executor");
        self.handle.close()
    }
}

/// Quotes `value` for a POSIX shell, leaving it bare when that is safe
pub fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
