//! Job template construction
//!
//! Turns a host job and its jobscript into a DRMAA job template:
//! - Interpolates the configured native arguments against the job
//! - Redirects stdout and stderr into the log directory, if one is set
//! - Names the job after its jobscript
//!
//! Templates are allocated from the session and handed out inside a
//! [`TemplateGuard`] which deletes them again when dropped.

use drmaa_client::DrmSession;
use drmaa_core::{JobTemplate, WorkflowJob};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::ExecutorSettings;
use crate::error::{ExecutorError, Result};

/// Builds job templates from executor settings
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    native_args: Option<String>,
    log_dir: Option<PathBuf>,
}

impl TemplateBuilder {
    /// Creates a builder, resolving a relative log directory against the
    /// current directory
    pub fn new(settings: &ExecutorSettings) -> Result<Self> {
        let log_dir = settings
            .log_dir
            .as_deref()
            .map(|dir| {
                std::path::absolute(dir).map_err(|source| ExecutorError::LogDir {
                    path: dir.to_path_buf(),
                    source,
                })
            })
            .transpose()?;

        Ok(Self {
            native_args: settings.args.clone(),
            log_dir,
        })
    }

    /// Directory receiving job stdout and stderr, if configured
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Interpolates the native arguments for `job`
    ///
    /// An unknown attribute in the arguments is an error of the job's rule,
    /// not of the executor.
    pub fn native_specification(&self, job: &dyn WorkflowJob) -> Result<String> {
        let Some(args) = self.native_args.as_deref() else {
            return Ok(String::new());
        };
        job.format_wildcards(args)
            .map_err(|e| ExecutorError::Workflow {
                rule: job.rule().to_string(),
                message: e.to_string(),
            })
    }

    /// Creates the log directory if it does not exist yet
    pub fn ensure_log_dir(&self) -> Result<()> {
        if let Some(dir) = &self.log_dir {
            std::fs::create_dir_all(dir).map_err(|source| ExecutorError::LogDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Allocates and fills a template for running `jobscript` on behalf of `job`
    pub fn build<'s>(
        &self,
        session: &'s dyn DrmSession,
        job: &dyn WorkflowJob,
        jobscript: &Path,
    ) -> Result<TemplateGuard<'s>> {
        let native_specification = self.native_specification(job)?;
        self.ensure_log_dir()?;

        let mut guard = TemplateGuard::allocate(session)?;
        let template = &mut guard.template;
        template.remote_command = jobscript.to_path_buf();
        template.native_specification = native_specification;
        if let Some(dir) = &self.log_dir {
            template.output_path = Some(JobTemplate::path_spec(dir));
            template.error_path = Some(JobTemplate::path_spec(dir));
        }
        template.job_name = jobscript
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        debug!(
            "Built {} for job {}: native specification '{}'",
            template.id, job.jobid(), template.native_specification
        );
        Ok(guard)
    }
}

/// A job template that is deleted from its session when dropped
pub struct TemplateGuard<'s> {
    session: &'s dyn DrmSession,
    template: JobTemplate,
}

impl<'s> TemplateGuard<'s> {
    fn allocate(session: &'s dyn DrmSession) -> Result<Self> {
        let id = session.create_job_template()?;
        Ok(Self {
            session,
            template: JobTemplate::new(id),
        })
    }
}

impl Deref for TemplateGuard<'_> {
    type Target = JobTemplate;

    fn deref(&self) -> &JobTemplate {
        &self.template
    }
}

impl Drop for TemplateGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.session.delete_job_template(self.template.id) {
            warn!("Failed to delete job template {}: {}", self.template.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drmaa_client::testing::ScriptedSession;
    use drmaa_client::DrmaaError;
    use drmaa_core::JobSpec;

    fn active_session() -> ScriptedSession {
        let session = ScriptedSession::new();
        session.initialize().unwrap();
        session
    }

    fn job() -> JobSpec {
        JobSpec::new(1, "bwa_map")
            .with_threads(4)
            .with_wildcard("sample", "A")
    }

    #[test]
    fn test_native_args_without_log_dir() {
        let session = active_session();
        let builder = TemplateBuilder::new(&ExecutorSettings::new().with_args("-q test.q")).unwrap();

        let guard = builder
            .build(&session, &job(), Path::new("/tmp/jobs/snakejob.bwa_map.1.sh"))
            .unwrap();

        assert_eq!(guard.native_specification, "-q test.q");
        assert_eq!(guard.output_path, None);
        assert_eq!(guard.error_path, None);
        assert_eq!(
            guard.remote_command,
            PathBuf::from("/tmp/jobs/snakejob.bwa_map.1.sh")
        );
        assert_eq!(guard.job_name.as_deref(), Some("snakejob.bwa_map.1.sh"));
    }

    #[test]
    fn test_log_dir_overrides_embedded_paths() {
        let session = active_session();
        let root = tempfile::tempdir().unwrap();
        let logs = root.path().join("logs").join("drmaa");
        let settings = ExecutorSettings::new()
            .with_args("-o /elsewhere -e /elsewhere -pe threaded {threads}")
            .with_log_dir(&logs);
        let builder = TemplateBuilder::new(&settings).unwrap();

        let guard = builder
            .build(&session, &job(), Path::new("/tmp/jobs/job.sh"))
            .unwrap();

        let expected = format!(":{}", logs.display());
        assert_eq!(guard.output_path.as_deref(), Some(expected.as_str()));
        assert_eq!(guard.error_path.as_deref(), Some(expected.as_str()));
        assert_eq!(
            guard.native_specification,
            "-o /elsewhere -e /elsewhere -pe threaded 4"
        );
        assert!(logs.is_dir());
    }

    #[test]
    fn test_existing_log_dir_is_tolerated() {
        let session = active_session();
        let logs = tempfile::tempdir().unwrap();
        let builder =
            TemplateBuilder::new(&ExecutorSettings::new().with_log_dir(logs.path())).unwrap();

        assert!(builder.build(&session, &job(), Path::new("a.sh")).is_ok());
        assert!(builder.build(&session, &job(), Path::new("b.sh")).is_ok());
    }

    #[test]
    fn test_relative_log_dir_is_made_absolute() {
        let builder = TemplateBuilder::new(&ExecutorSettings::new().with_log_dir("logs")).unwrap();
        let dir = builder.log_dir().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("logs"));
    }

    #[test]
    fn test_unknown_attribute_names_rule() {
        let session = active_session();
        let builder =
            TemplateBuilder::new(&ExecutorSettings::new().with_args("-q {queue}")).unwrap();

        let err = builder
            .build(&session, &job(), Path::new("job.sh"))
            .err()
            .unwrap();

        match err {
            ExecutorError::Workflow { rule, message } => {
                assert_eq!(rule, "bwa_map");
                assert!(message.contains("queue"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(session.live_templates(), 0);
    }

    #[test]
    fn test_guard_deletes_template() {
        let session = active_session();
        let builder = TemplateBuilder::new(&ExecutorSettings::new()).unwrap();

        let guard = builder.build(&session, &job(), Path::new("job.sh")).unwrap();
        let id = guard.id;
        assert_eq!(session.live_templates(), 1);

        drop(guard);
        assert_eq!(session.live_templates(), 0);
        assert_eq!(session.deleted_templates(), vec![id]);
    }

    #[test]
    fn test_template_allocation_failure() {
        let session = ScriptedSession::new();
        let builder = TemplateBuilder::new(&ExecutorSettings::new()).unwrap();

        let err = builder
            .build(&session, &job(), Path::new("job.sh"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ExecutorError::Drmaa(DrmaaError::NoActiveSession)
        ));
    }
}
