//! Job submission
//!
//! Hands a host job's jobscript to the DRM and starts tracking it.

use drmaa_client::DrmSession;
use drmaa_core::{JobHandle, SubmittedJob};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{ExecutorError, Result};
use crate::reporter::JobReporter;
use crate::service::JobscriptCleaner;
use crate::template::TemplateBuilder;

/// Submits jobscripts through a DRM session
pub struct JobSubmitter {
    session: Arc<dyn DrmSession>,
    builder: TemplateBuilder,
    reporter: Arc<dyn JobReporter>,
    cleaner: JobscriptCleaner,
}

impl JobSubmitter {
    pub fn new(
        session: Arc<dyn DrmSession>,
        builder: TemplateBuilder,
        reporter: Arc<dyn JobReporter>,
        cleaner: JobscriptCleaner,
    ) -> Self {
        Self {
            session,
            builder,
            reporter,
            cleaner,
        }
    }

    /// Submits `jobscript` on behalf of `job`
    ///
    /// On success the job is reported as submitted and returned for
    /// tracking. When the DRM rejects the job it is reported as failed and
    /// [`ExecutorError::Submission`] is returned. Every failure removes the
    /// jobscript, since nothing will run it.
    pub fn submit(&self, job: JobHandle, jobscript: PathBuf) -> Result<SubmittedJob> {
        // The template is deleted when the guard leaves this expression
        let submitted = self
            .builder
            .build(self.session.as_ref(), job.as_ref(), &jobscript)
            .and_then(|template| Ok(self.session.run_job(&template)?));

        match submitted {
            Ok(external_jobid) => {
                let job = SubmittedJob::new(job, external_jobid, jobscript);
                info!(
                    "Submitted DRMAA job {} with external jobid {}.",
                    job.jobid(),
                    job.external_jobid()
                );
                self.reporter.report_job_submission(&job);
                Ok(job)
            }
            Err(ExecutorError::Drmaa(source)) if source.is_submission_rejection() => {
                let message = format!("Error submitting job (DRMAA error {})", source);
                error!("Job {}: {}", job.jobid(), message);
                self.reporter.report_job_error(job.as_ref(), Some(&message));
                self.discard(&jobscript);
                Err(ExecutorError::Submission {
                    jobid: job.jobid(),
                    source,
                })
            }
            Err(e) => {
                self.discard(&jobscript);
                Err(e)
            }
        }
    }

    /// Removes the jobscript of a job that never reached the DRM
    fn discard(&self, jobscript: &Path) {
        if let Err(e) = self.cleaner.remove(jobscript) {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactCleanup, ExecutorSettings};
    use crate::reporter::recording::{RecordingReporter, Report};
    use drmaa_client::DrmaaError;
    use drmaa_client::testing::ScriptedSession;
    use drmaa_core::JobSpec;

    struct Fixture {
        session: Arc<ScriptedSession>,
        reporter: Arc<RecordingReporter>,
        submitter: JobSubmitter,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(settings: ExecutorSettings) -> Self {
            let session = Arc::new(ScriptedSession::new());
            session.initialize().unwrap();
            let reporter = Arc::new(RecordingReporter::default());
            let submitter = JobSubmitter::new(
                session.clone(),
                TemplateBuilder::new(&settings).unwrap(),
                reporter.clone(),
                JobscriptCleaner::new(ArtifactCleanup::Propagate),
            );
            Self {
                session,
                reporter,
                submitter,
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn jobscript(&self, jobid: u64) -> PathBuf {
            let script = self.dir.path().join(format!("snakejob.{}.sh", jobid));
            std::fs::write(&script, "#!/bin/sh\ntrue\n").unwrap();
            script
        }
    }

    fn job(jobid: u64) -> JobHandle {
        Arc::new(JobSpec::new(jobid, "bwa_map").with_threads(8))
    }

    #[test]
    fn test_submit_tracks_and_reports_job() {
        let fixture = Fixture::new(ExecutorSettings::new().with_args("-q test.q"));
        let script = fixture.jobscript(3);

        let submitted = fixture.submitter.submit(job(3), script.clone()).unwrap();

        assert_eq!(submitted.jobid(), 3);
        assert_eq!(submitted.external_jobid().as_str(), "1");
        assert_eq!(submitted.jobscript(), script.as_path());
        assert_eq!(
            fixture.reporter.reports(),
            vec![Report::Submitted {
                jobid: 3,
                external_jobid: "1".to_string()
            }]
        );

        let templates = fixture.session.submitted_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].native_specification, "-q test.q");
        assert_eq!(templates[0].remote_command, script);
        assert_eq!(fixture.session.live_templates(), 0);
        assert!(script.exists());
    }

    #[test]
    fn test_rejected_submission_reports_error() {
        let fixture = Fixture::new(ExecutorSettings::new());
        let script = fixture.jobscript(4);
        fixture
            .session
            .fail_next_submission(DrmaaError::DeniedByDrm("queue full".to_string()));

        let err = fixture.submitter.submit(job(4), script.clone()).unwrap_err();

        assert!(matches!(
            err,
            ExecutorError::Submission {
                jobid: 4,
                source: DrmaaError::DeniedByDrm(_)
            }
        ));
        assert!(err.is_task_scoped());
        match &fixture.reporter.reports()[..] {
            [Report::Error { jobid: 4, msg: Some(msg) }] => {
                assert!(msg.starts_with("Error submitting job"));
                assert!(msg.contains("queue full"));
            }
            other => panic!("unexpected reports: {:?}", other),
        }
        assert!(!script.exists());
        assert_eq!(fixture.session.live_templates(), 0);
    }

    #[test]
    fn test_invalid_attribute_is_a_rejection() {
        let fixture = Fixture::new(ExecutorSettings::new().with_args("-l bogus"));
        fixture
            .session
            .fail_next_submission(DrmaaError::InvalidAttributeValue("-l bogus".to_string()));

        let err = fixture
            .submitter
            .submit(job(5), fixture.jobscript(5))
            .unwrap_err();

        assert!(matches!(err, ExecutorError::Submission { jobid: 5, .. }));
        assert_eq!(fixture.reporter.errors_for(5), 1);
    }

    #[test]
    fn test_other_drmaa_errors_propagate_unreported() {
        let fixture = Fixture::new(ExecutorSettings::new());
        let script = fixture.jobscript(6);
        fixture
            .session
            .fail_next_submission(DrmaaError::DrmCommunication("lost qmaster".to_string()));

        let err = fixture.submitter.submit(job(6), script.clone()).unwrap_err();

        assert!(matches!(
            err,
            ExecutorError::Drmaa(DrmaaError::DrmCommunication(_))
        ));
        assert!(!err.is_task_scoped());
        assert!(fixture.reporter.reports().is_empty());
        assert!(!script.exists());
    }

    #[test]
    fn test_bad_native_args_fail_the_rule() {
        let fixture = Fixture::new(ExecutorSettings::new().with_args("-q {queue}"));

        let err = fixture
            .submitter
            .submit(job(7), fixture.jobscript(7))
            .unwrap_err();

        assert!(matches!(err, ExecutorError::Workflow { ref rule, .. } if rule == "bwa_map"));
        assert!(fixture.session.submitted_templates().is_empty());
        assert!(fixture.reporter.reports().is_empty());
    }

    #[test]
    fn test_bad_native_args_leave_other_jobs_alone() {
        let fixture = Fixture::new(ExecutorSettings::new().with_args("-q {wildcards.queue}"));
        let broken: JobHandle = Arc::new(JobSpec::new(8, "bwa_map"));
        let fine: JobHandle = Arc::new(JobSpec::new(9, "bwa_map").with_wildcard("queue", "long.q"));

        let err = fixture
            .submitter
            .submit(broken, fixture.jobscript(8))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Workflow { .. }));

        let submitted = fixture.submitter.submit(fine, fixture.jobscript(9)).unwrap();

        assert_eq!(submitted.jobid(), 9);
        assert_eq!(
            fixture.reporter.reports(),
            vec![Report::Submitted {
                jobid: 9,
                external_jobid: submitted.external_jobid().to_string()
            }]
        );
        let templates = fixture.session.submitted_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].native_specification, "-q long.q");
        assert_eq!(templates[0].job_name.as_deref(), Some("snakejob.9.sh"));
        assert_eq!(fixture.session.live_templates(), 0);
    }

    #[test]
    fn test_external_ids_are_unique() {
        let fixture = Fixture::new(ExecutorSettings::new());
        let first = fixture.submitter.submit(job(1), fixture.jobscript(1)).unwrap();
        let second = fixture.submitter.submit(job(2), fixture.jobscript(2)).unwrap();
        assert_ne!(first.external_jobid(), second.external_jobid());
    }
}
