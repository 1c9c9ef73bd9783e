//! DRMAA session handle
//!
//! Owns the executor's use of a [`DrmSession`]: the session is initialized
//! once when the executor starts and released once when it shuts down.

use drmaa_client::{DrmSession, DrmaaError};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ExecutorError, Result};

/// Open session that is released exactly once
///
/// DRMAA sessions are process-wide, so several handles may share one. Only
/// [`SessionHandle::close`] releases a session unconditionally; a handle
/// dropped without closing releases the session only if it opened it.
pub struct SessionHandle {
    session: Arc<dyn DrmSession>,
    open: bool,
    /// False when the session was already active on open
    opened_here: bool,
}

impl SessionHandle {
    /// Initializes `session`
    ///
    /// A session that is already active counts as opened. Any other failure
    /// means DRMAA cannot be used in this environment and is returned as
    /// [`ExecutorError::Session`].
    pub fn open(session: Arc<dyn DrmSession>) -> Result<Self> {
        let opened_here = match session.initialize() {
            Ok(()) => {
                info!("DRMAA session initialized");
                true
            }
            Err(DrmaaError::AlreadyActiveSession) => {
                debug!("DRMAA session already active, reusing it");
                false
            }
            Err(e) => return Err(ExecutorError::Session(e)),
        };

        Ok(Self {
            session,
            open: true,
            opened_here,
        })
    }

    /// The underlying session
    pub fn session(&self) -> &Arc<dyn DrmSession> {
        &self.session
    }

    /// Releases the session
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        self.session.exit().map_err(ExecutorError::Session)?;
        info!("DRMAA session closed");
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if !self.opened_here {
            debug!("Dropping handle to a reused DRMAA session, leaving it open");
            return;
        }
        warn!("DRMAA session dropped without shutdown, releasing it");
        if let Err(e) = self.session.exit() {
            warn!("Failed to release DRMAA session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drmaa_client::testing::ScriptedSession;

    #[test]
    fn test_open_and_close() {
        let session = Arc::new(ScriptedSession::new());
        let handle = SessionHandle::open(session.clone()).unwrap();
        assert!(session.is_active());

        handle.close().unwrap();
        assert!(!session.is_active());
        assert_eq!(session.exit_calls(), 1);
    }

    #[test]
    fn test_open_twice_is_idempotent() {
        let session = Arc::new(ScriptedSession::new());
        let first = SessionHandle::open(session.clone()).unwrap();
        let second = SessionHandle::open(session.clone()).unwrap();

        assert_eq!(session.initialize_calls(), 2);
        assert_eq!(session.sessions_opened(), 1);

        drop(second);
        assert_eq!(session.exit_calls(), 0);
        assert!(session.is_active());

        first.close().unwrap();
        assert_eq!(session.exit_calls(), 1);
    }

    #[test]
    fn test_open_already_active_session() {
        let session = Arc::new(ScriptedSession::already_active());
        let handle = SessionHandle::open(session.clone()).unwrap();
        assert_eq!(session.sessions_opened(), 1);
        handle.close().unwrap();
        assert_eq!(session.exit_calls(), 1);
        assert!(!session.is_active());
    }

    #[test]
    fn test_dropped_reused_handle_leaves_session_open() {
        let session = Arc::new(ScriptedSession::already_active());
        drop(SessionHandle::open(session.clone()).unwrap());
        assert_eq!(session.exit_calls(), 0);
        assert!(session.is_active());
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let session = Arc::new(ScriptedSession::new());
        session.fail_initialize_with(DrmaaError::DrmCommunication("no qmaster".to_string()));

        let err = SessionHandle::open(session.clone()).err().unwrap();
        assert!(matches!(
            err,
            ExecutorError::Session(DrmaaError::DrmCommunication(_))
        ));
        assert_eq!(session.exit_calls(), 0);
    }

    #[test]
    fn test_drop_releases_session_once() {
        let session = Arc::new(ScriptedSession::new());
        drop(SessionHandle::open(session.clone()).unwrap());
        assert_eq!(session.exit_calls(), 1);
        assert!(!session.is_active());
    }
}
