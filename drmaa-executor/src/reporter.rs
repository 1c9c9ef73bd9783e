//! Host callbacks
//!
//! The executor tells the host about job progress through [`JobReporter`].
//! Every job that is handed to the DRM gets exactly one submission report
//! followed by exactly one success or error report.

use drmaa_core::{SubmittedJob, WorkflowJob};

/// Receives job lifecycle reports from the executor
pub trait JobReporter: Send + Sync {
    /// The job was accepted by the DRM and is now being tracked
    fn report_job_submission(&self, job: &SubmittedJob);

    /// The job finished successfully
    fn report_job_success(&self, job: &SubmittedJob);

    /// The job failed, either at submission or while it was tracked
    ///
    /// # Arguments
    /// * `job` - The host job that failed
    /// * `msg` - Optional diagnostic for the host to display
    fn report_job_error(&self, job: &dyn WorkflowJob, msg: Option<&str>);
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// A single report received by [`RecordingReporter`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Report {
        Submitted { jobid: u64, external_jobid: String },
        Success { jobid: u64 },
        Error { jobid: u64, msg: Option<String> },
    }

    /// Reporter that keeps every report for later inspection
    #[derive(Default)]
    pub struct RecordingReporter {
        reports: Mutex<Vec<Report>>,
    }

    impl RecordingReporter {
        pub fn reports(&self) -> Vec<Report> {
            self.reports.lock().unwrap().clone()
        }

        pub fn errors_for(&self, jobid: u64) -> usize {
            self.reports()
                .iter()
                .filter(|r| matches!(r, Report::Error { jobid: id, .. } if *id == jobid))
                .count()
        }

        pub fn successes_for(&self, jobid: u64) -> usize {
            self.reports()
                .iter()
                .filter(|r| matches!(r, Report::Success { jobid: id } if *id == jobid))
                .count()
        }
    }

    impl JobReporter for RecordingReporter {
        fn report_job_submission(&self, job: &SubmittedJob) {
            self.reports.lock().unwrap().push(Report::Submitted {
                jobid: job.jobid(),
                external_jobid: job.external_jobid().to_string(),
            });
        }

        fn report_job_success(&self, job: &SubmittedJob) {
            self.reports
                .lock()
                .unwrap()
                .push(Report::Success { jobid: job.jobid() });
        }

        fn report_job_error(&self, job: &dyn WorkflowJob, msg: Option<&str>) {
            self.reports.lock().unwrap().push(Report::Error {
                jobid: job.jobid(),
                msg: msg.map(str::to_string),
            });
        }
    }
}
