//! Local process session
//!
//! Implements [`DrmSession`] on top of the local machine: every submitted job
//! is a `/bin/sh` child process of this session. Useful for running
//! workflows on a workstation and for exercising the executor without a
//! cluster. Native specifications are accepted but ignored.

use drmaa_core::{JobControlAction, JobState, JobTemplate, RemoteJobId, TemplateId};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{DrmaaError, Result};
use crate::session::DrmSession;

const SHELL: &str = "/bin/sh";

/// Session that runs jobs as local processes
pub struct LocalSession {
    state: Mutex<LocalState>,
}

#[derive(Default)]
struct LocalState {
    active: bool,
    next_template: u64,
    next_job: u64,
    templates: HashSet<TemplateId>,
    jobs: HashMap<RemoteJobId, LocalJob>,
}

enum LocalJob {
    Running(Child),
    Exited { success: bool },
    Terminated,
}

impl LocalSession {
    /// Creates a session that is not yet initialized
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|_| DrmaaError::Internal("local session state is poisoned".to_string()))
    }

    fn active_state(&self) -> Result<MutexGuard<'_, LocalState>> {
        let state = self.state()?;
        if !state.active {
            return Err(DrmaaError::NoActiveSession);
        }
        Ok(state)
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DrmSession for LocalSession {
    fn initialize(&self) -> Result<()> {
        let mut state = self.state()?;
        if state.active {
            return Err(DrmaaError::AlreadyActiveSession);
        }
        state.active = true;
        info!("Local DRMAA session initialized");
        Ok(())
    }

    fn exit(&self) -> Result<()> {
        let mut state = self.active_state()?;
        let running = state
            .jobs
            .values()
            .filter(|job| matches!(job, LocalJob::Running(_)))
            .count();
        if running > 0 {
            warn!("Closing local session with {} job(s) still running", running);
        }
        state.active = false;
        state.templates.clear();
        state.jobs.clear();
        info!("Local DRMAA session closed");
        Ok(())
    }

    fn create_job_template(&self) -> Result<TemplateId> {
        let mut state = self.active_state()?;
        state.next_template += 1;
        let id = TemplateId(state.next_template);
        state.templates.insert(id);
        Ok(id)
    }

    fn delete_job_template(&self, id: TemplateId) -> Result<()> {
        let mut state = self.active_state()?;
        if !state.templates.remove(&id) {
            return Err(DrmaaError::InvalidArgument(format!(
                "unknown job template {}",
                id
            )));
        }
        Ok(())
    }

    fn run_job(&self, template: &JobTemplate) -> Result<RemoteJobId> {
        let mut state = self.active_state()?;
        if !state.templates.contains(&template.id) {
            return Err(DrmaaError::InvalidArgument(format!(
                "unknown job template {}",
                template.id
            )));
        }
        if template.remote_command.as_os_str().is_empty() {
            return Err(DrmaaError::InvalidAttributeValue(
                "remoteCommand is not set".to_string(),
            ));
        }
        if !template.native_specification.is_empty() {
            debug!(
                "Ignoring native specification '{}' for local execution",
                template.native_specification
            );
        }

        let number = state.next_job + 1;
        let job_name = template
            .job_name
            .clone()
            .or_else(|| {
                template
                    .remote_command
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "job".to_string());

        let workdir = match &template.working_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .map_err(|e| DrmaaError::Internal(format!("cannot resolve working directory: {}", e)))?,
        };

        let stdout = open_output(template.output_path.as_deref(), &workdir, &job_name, 'o', number)?;
        let stderr = open_output(template.error_path.as_deref(), &workdir, &job_name, 'e', number)?;

        let child = Command::new(SHELL)
            .arg(&template.remote_command)
            .args(&template.args)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => DrmaaError::DeniedByDrm(e.to_string()),
                _ => DrmaaError::Internal(format!("failed to spawn job: {}", e)),
            })?;

        state.next_job = number;
        let job_id = RemoteJobId::new(number.to_string());
        debug!(
            "Started local job {} ({}) as pid {}",
            job_id,
            job_name,
            child.id()
        );
        state.jobs.insert(job_id.clone(), LocalJob::Running(child));

        Ok(job_id)
    }

    fn job_status(&self, job_id: &RemoteJobId) -> Result<JobState> {
        let mut state = self.active_state()?;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DrmaaError::InvalidJob(job_id.to_string()))?;

        match job {
            LocalJob::Running(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    let success = status.success();
                    *job = LocalJob::Exited { success };
                    Ok(if success { JobState::Done } else { JobState::Failed })
                }
                Ok(None) => Ok(JobState::Running),
                Err(e) => Err(DrmaaError::Internal(format!(
                    "failed to query job {}: {}",
                    job_id, e
                ))),
            },
            LocalJob::Exited { success: true } => Ok(JobState::Done),
            LocalJob::Exited { success: false } | LocalJob::Terminated => Ok(JobState::Failed),
        }
    }

    fn control(&self, job_id: &RemoteJobId, action: JobControlAction) -> Result<()> {
        let mut state = self.active_state()?;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DrmaaError::InvalidJob(job_id.to_string()))?;

        if action != JobControlAction::Terminate {
            return Err(DrmaaError::Unsupported(action));
        }

        let LocalJob::Running(child) = job else {
            return Err(DrmaaError::InvalidJob(format!(
                "job {} has already finished",
                job_id
            )));
        };

        // A child that exited on its own keeps its exit status
        match child.try_wait() {
            Ok(Some(status)) => {
                *job = LocalJob::Exited {
                    success: status.success(),
                };
                return Err(DrmaaError::InvalidJob(format!(
                    "job {} has already finished",
                    job_id
                )));
            }
            Ok(None) => {}
            Err(e) => {
                return Err(DrmaaError::Internal(format!(
                    "failed to query job {}: {}",
                    job_id, e
                )));
            }
        }

        // kill() fails with InvalidInput once the child has been reaped
        match child.kill() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::InvalidInput => {}
            Err(e) => {
                return Err(DrmaaError::Internal(format!(
                    "failed to terminate job {}: {}",
                    job_id, e
                )));
            }
        }
        child
            .wait()
            .map_err(|e| DrmaaError::Internal(format!("failed to reap job {}: {}", job_id, e)))?;
        *job = LocalJob::Terminated;

        debug!("Terminated local job {}", job_id);
        Ok(())
    }
}

/// Opens the file a job stream is redirected to
///
/// A path spec naming a directory (or no spec at all) places the stream in
/// `<name>.<kind><number>` inside it, following the SGE convention.
fn open_output(
    spec: Option<&str>,
    workdir: &Path,
    job_name: &str,
    kind: char,
    number: u64,
) -> Result<File> {
    let mut path: PathBuf = match spec {
        Some(spec) => workdir.join(JobTemplate::split_path_spec(spec).1),
        None => workdir.to_path_buf(),
    };
    if path.is_dir() {
        path.push(format!("{}.{}{}", job_name, kind, number));
    }

    File::create(&path)
        .map_err(|e| DrmaaError::InvalidAttributeValue(format!("{}: {}", path.display(), e)))
}
