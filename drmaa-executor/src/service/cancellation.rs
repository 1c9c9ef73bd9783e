//! Job cancellation
//!
//! Best-effort termination of tracked jobs when the host is interrupted.

use drmaa_client::DrmSession;
use drmaa_core::{JobControlAction, SubmittedJob};
use tracing::{debug, info};

use crate::error::{ExecutorError, Result};

/// Asks the DRM to terminate every job in `active`
///
/// Jobs that are already gone, and internal DRM errors, are expected while
/// shutting down and are ignored. Any other error aborts cancellation and is
/// returned as [`ExecutorError::Cancellation`].
pub fn cancel_jobs(session: &dyn DrmSession, active: Vec<SubmittedJob>) -> Result<()> {
    if active.is_empty() {
        return Ok(());
    }
    info!("Cancelling {} DRMAA job(s)", active.len());

    for job in active {
        match session.control(job.external_jobid(), JobControlAction::Terminate) {
            Ok(()) => debug!("Terminated DRMAA job {}", job.external_jobid()),
            Err(e) if e.is_ignorable_on_cancel() => {
                debug!(
                    "Ignoring error while terminating DRMAA job {}: {}",
                    job.external_jobid(),
                    e
                )
            }
            Err(source) => {
                return Err(ExecutorError::Cancellation {
                    jobid: job.external_jobid().to_string(),
                    source,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drmaa_client::DrmaaError;
    use drmaa_client::testing::ScriptedSession;
    use drmaa_core::{JobSpec, RemoteJobId};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn tracked(jobid: u64) -> SubmittedJob {
        SubmittedJob::new(
            Arc::new(JobSpec::new(jobid, "rule")),
            RemoteJobId::new(jobid.to_string()),
            PathBuf::from(format!("/tmp/job.{}.sh", jobid)),
        )
    }

    #[test]
    fn test_cancel_ignores_jobs_already_gone() {
        let session = ScriptedSession::new();
        session.fail_control(
            &RemoteJobId::new("1"),
            DrmaaError::InvalidJob("1".to_string()),
        );

        assert!(cancel_jobs(&session, vec![tracked(1), tracked(2)]).is_ok());
        assert_eq!(
            session.control_calls(),
            vec![
                (RemoteJobId::new("1"), JobControlAction::Terminate),
                (RemoteJobId::new("2"), JobControlAction::Terminate),
            ]
        );
    }

    #[test]
    fn test_cancel_ignores_internal_errors() {
        let session = ScriptedSession::new();
        session.fail_control(
            &RemoteJobId::new("2"),
            DrmaaError::Internal("transient".to_string()),
        );

        assert!(cancel_jobs(&session, vec![tracked(1), tracked(2), tracked(3)]).is_ok());
        assert_eq!(session.control_calls().len(), 3);
    }

    #[test]
    fn test_cancel_propagates_other_errors() {
        let session = ScriptedSession::new();
        session.fail_control(
            &RemoteJobId::new("1"),
            DrmaaError::DeniedByDrm("not your job".to_string()),
        );

        let err = cancel_jobs(&session, vec![tracked(1), tracked(2)]).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Cancellation { ref jobid, source: DrmaaError::DeniedByDrm(_) } if jobid == "1"
        ));
        assert_eq!(session.control_calls().len(), 1);
    }

    #[test]
    fn test_cancel_nothing() {
        let session = ScriptedSession::new();
        assert!(cancel_jobs(&session, Vec::new()).is_ok());
        assert!(session.control_calls().is_empty());
    }
}
