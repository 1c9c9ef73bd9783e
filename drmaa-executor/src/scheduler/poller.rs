//! Job status poller
//!
//! Reconciles the DRM's view of tracked jobs with the host's. Each call to
//! [`StatusPoller::check_active_jobs`] walks the tracked jobs in order, asks
//! the DRM for each job's state under the shared rate limiter and either
//! hands the job back (still active) or retires it with a success or error
//! report.

use drmaa_client::{DrmSession, DrmaaError};
use drmaa_core::{JobState, SubmittedJob};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::error::{ExecutorError, Result};
use crate::reporter::JobReporter;
use crate::scheduler::rate_limiter::StatusRateLimiter;
use crate::service::JobscriptCleaner;

/// Result of draining one poll cycle
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Jobs that are still active, in the order they were given
    pub active: Vec<SubmittedJob>,
    /// Executor errors raised while retiring jobs
    pub errors: Vec<ExecutorError>,
}

/// Polls the DRM for the state of tracked jobs
pub struct StatusPoller {
    session: Arc<dyn DrmSession>,
    reporter: Arc<dyn JobReporter>,
    limiter: Arc<StatusRateLimiter>,
    cleaner: JobscriptCleaner,
    /// Host job ids whose current suspension was already logged
    suspended: Mutex<HashSet<u64>>,
}

impl StatusPoller {
    /// Creates a new status poller
    pub fn new(
        session: Arc<dyn DrmSession>,
        reporter: Arc<dyn JobReporter>,
        limiter: Arc<StatusRateLimiter>,
        cleaner: JobscriptCleaner,
    ) -> Self {
        Self {
            session,
            reporter,
            limiter,
            cleaner,
            suspended: Mutex::new(HashSet::new()),
        }
    }

    /// Checks every job in `active` once
    ///
    /// The returned stream yields the jobs that are still active. Jobs that
    /// are not yielded have already been reported as succeeded or failed and
    /// had their jobscript removed. An `Err` item means retiring a job hit an
    /// executor-level problem; the job was still reported and the stream
    /// carries on with the next one.
    pub fn check_active_jobs(
        &self,
        active: Vec<SubmittedJob>,
    ) -> impl Stream<Item = Result<SubmittedJob>> + '_ {
        debug!("Checking status of {} active job(s)", active.len());
        stream::iter(active)
            .then(move |job| self.check_job(job))
            .filter_map(|outcome| future::ready(outcome.transpose()))
    }

    /// Runs a full poll cycle and collects its outcome
    pub async fn poll_active_jobs(&self, active: Vec<SubmittedJob>) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        let mut results = std::pin::pin!(self.check_active_jobs(active));

        while let Some(result) = results.next().await {
            match result {
                Ok(job) => outcome.active.push(job),
                Err(e) => outcome.errors.push(e),
            }
        }

        outcome
    }

    /// Returns true if the job's last observed state was a suspension
    pub fn is_suspended(&self, jobid: u64) -> bool {
        self.suspended_jobs().contains(&jobid)
    }

    fn suspended_jobs(&self) -> std::sync::MutexGuard<'_, HashSet<u64>> {
        self.suspended.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn check_job(&self, job: SubmittedJob) -> Result<Option<SubmittedJob>> {
        self.limiter.acquire().await;

        match self.session.job_status(job.external_jobid()) {
            // The DRM has no answer yet, the job is still around
            Err(DrmaaError::ExitTimeout) => Ok(Some(job)),
            Err(e) => {
                error!("DRMAA Error: {}", e);
                let message = format!(
                    "Failed to query status of DRMAA job {}: {}",
                    job.external_jobid(),
                    e
                );
                self.retire(job, Some(&message)).map(|()| None)
            }
            Ok(JobState::Done) => {
                info!(
                    "DRMAA job {} (external id {}) finished after {}s",
                    job.jobid(),
                    job.external_jobid(),
                    (chrono::Utc::now() - job.submitted_at()).num_seconds()
                );
                self.forget_suspension(job.jobid());
                let cleanup = self.cleaner.remove(job.jobscript());
                self.reporter.report_job_success(&job);
                cleanup.map(|()| None)
            }
            Ok(JobState::Failed) => {
                let message = format!("DRMAA job {} failed", job.external_jobid());
                self.retire(job, Some(&message)).map(|()| None)
            }
            Ok(state) => {
                self.track_suspension(&job, state);
                Ok(Some(job))
            }
        }
    }

    /// Drops a failed job: removes its jobscript and reports the error
    fn retire(&self, job: SubmittedJob, message: Option<&str>) -> Result<()> {
        self.forget_suspension(job.jobid());
        let cleanup = self.cleaner.remove(job.jobscript());
        self.reporter.report_job_error(job.job().as_ref(), message);
        cleanup
    }

    fn track_suspension(&self, job: &SubmittedJob, state: JobState) {
        match state.suspended_by() {
            Some(by) => {
                if self.suspended_jobs().insert(job.jobid()) {
                    warn!(
                        "Job {} (DRMAA id: {}) was suspended by {}.",
                        job.jobid(),
                        job.external_jobid(),
                        by
                    );
                }
            }
            None => self.forget_suspension(job.jobid()),
        }
    }

    fn forget_suspension(&self, jobid: u64) {
        self.suspended_jobs().remove(&jobid);
    }
}
