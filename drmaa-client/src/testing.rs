//! Scripted session for tests
//!
//! [`ScriptedSession`] answers every call from state the test sets up
//! beforehand and records what the caller did, so executor behavior can be
//! checked without a DRM.

use drmaa_core::{JobControlAction, JobState, JobTemplate, RemoteJobId, TemplateId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{DrmaaError, Result};
use crate::session::DrmSession;

/// In-memory session driven by queued responses
#[derive(Default)]
pub struct ScriptedSession {
    state: Mutex<ScriptedState>,
}

#[derive(Default)]
struct ScriptedState {
    active: bool,
    initialize_calls: usize,
    sessions_opened: usize,
    exit_calls: usize,
    initialize_error: Option<DrmaaError>,
    next_template: u64,
    next_job: u64,
    live_templates: HashSet<TemplateId>,
    deleted_templates: Vec<TemplateId>,
    submit_errors: VecDeque<DrmaaError>,
    submitted: Vec<JobTemplate>,
    statuses: HashMap<RemoteJobId, VecDeque<Result<JobState>>>,
    status_queries: Vec<RemoteJobId>,
    control_errors: HashMap<RemoteJobId, DrmaaError>,
    controls: Vec<(RemoteJobId, JobControlAction)>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session some other component of the process already initialized
    pub fn already_active() -> Self {
        let session = Self::new();
        {
            let mut state = session.state();
            state.active = true;
            state.sessions_opened = 1;
        }
        session
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every `initialize` call fail with `error`
    pub fn fail_initialize_with(&self, error: DrmaaError) {
        self.state().initialize_error = Some(error);
    }

    /// Makes the next `run_job` call fail with `error`
    pub fn fail_next_submission(&self, error: DrmaaError) {
        self.state().submit_errors.push_back(error);
    }

    /// Queues the responses of successive `job_status` calls for `job_id`
    ///
    /// Once the queue is drained the job reports [`JobState::Running`].
    pub fn push_statuses<I>(&self, job_id: &RemoteJobId, responses: I)
    where
        I: IntoIterator<Item = Result<JobState>>,
    {
        self.state()
            .statuses
            .entry(job_id.clone())
            .or_default()
            .extend(responses);
    }

    /// Makes `control` calls for `job_id` fail with `error`
    pub fn fail_control(&self, job_id: &RemoteJobId, error: DrmaaError) {
        self.state().control_errors.insert(job_id.clone(), error);
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    pub fn initialize_calls(&self) -> usize {
        self.state().initialize_calls
    }

    /// Number of times a session was actually opened
    pub fn sessions_opened(&self) -> usize {
        self.state().sessions_opened
    }

    pub fn exit_calls(&self) -> usize {
        self.state().exit_calls
    }

    /// Templates passed to `run_job`, in submission order
    pub fn submitted_templates(&self) -> Vec<JobTemplate> {
        self.state().submitted.clone()
    }

    /// Templates allocated and not yet deleted
    pub fn live_templates(&self) -> usize {
        self.state().live_templates.len()
    }

    pub fn deleted_templates(&self) -> Vec<TemplateId> {
        self.state().deleted_templates.clone()
    }

    /// Job ids passed to `job_status`, in call order
    pub fn status_queries(&self) -> Vec<RemoteJobId> {
        self.state().status_queries.clone()
    }

    /// Control calls, in call order
    pub fn control_calls(&self) -> Vec<(RemoteJobId, JobControlAction)> {
        self.state().controls.clone()
    }
}

impl DrmSession for ScriptedSession {
    fn initialize(&self) -> Result<()> {
        let mut state = self.state();
        state.initialize_calls += 1;
        if let Some(error) = state.initialize_error.clone() {
            return Err(error);
        }
        if state.active {
            return Err(DrmaaError::AlreadyActiveSession);
        }
        state.active = true;
        state.sessions_opened += 1;
        Ok(())
    }

    fn exit(&self) -> Result<()> {
        let mut state = self.state();
        state.exit_calls += 1;
        if !state.active {
            return Err(DrmaaError::NoActiveSession);
        }
        state.active = false;
        Ok(())
    }

    fn create_job_template(&self) -> Result<TemplateId> {
        let mut state = self.state();
        if !state.active {
            return Err(DrmaaError::NoActiveSession);
        }
        state.next_template += 1;
        let id = TemplateId(state.next_template);
        state.live_templates.insert(id);
        Ok(id)
    }

    fn delete_job_template(&self, id: TemplateId) -> Result<()> {
        let mut state = self.state();
        if !state.live_templates.remove(&id) {
            return Err(DrmaaError::InvalidArgument(format!(
                "unknown job template {}",
                id
            )));
        }
        state.deleted_templates.push(id);
        Ok(())
    }

    fn run_job(&self, template: &JobTemplate) -> Result<RemoteJobId> {
        let mut state = self.state();
        if !state.active {
            return Err(DrmaaError::NoActiveSession);
        }
        state.submitted.push(template.clone());
        if let Some(error) = state.submit_errors.pop_front() {
            return Err(error);
        }
        state.next_job += 1;
        Ok(RemoteJobId::new(state.next_job.to_string()))
    }

    fn job_status(&self, job_id: &RemoteJobId) -> Result<JobState> {
        let mut state = self.state();
        state.status_queries.push(job_id.clone());
        state
            .statuses
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(JobState::Running))
    }

    fn control(&self, job_id: &RemoteJobId, action: JobControlAction) -> Result<()> {
        let mut state = self.state();
        state.controls.push((job_id.clone(), action));
        match state.control_errors.get(job_id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
