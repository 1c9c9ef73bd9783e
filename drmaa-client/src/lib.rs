//! DRMAA Session Client
//!
//! The boundary between the executor and a distributed resource manager.
//!
//! This crate provides:
//! - [`DrmSession`]: the operations the executor relies on
//! - [`DrmaaError`]: one variant per DRMAA error class
//! - [`LocalSession`]: runs jobscripts as local processes
//! - `ScriptedSession` (feature `test-util`): an in-memory session driven by
//!   queued responses
//!
//! # Example
//!
//! ```no_run
//! use drmaa_client::{DrmSession, LocalSession};
//! use drmaa_core::JobTemplate;
//!
//! fn main() -> drmaa_client::Result<()> {
//!     let session = LocalSession::new();
//!     session.initialize()?;
//!
//!     let mut template = JobTemplate::new(session.create_job_template()?);
//!     template.remote_command = "job.sh".into();
//!     let job_id = session.run_job(&template)?;
//!     session.delete_job_template(template.id)?;
//!
//!     println!("Submitted {}: {}", job_id, session.job_status(&job_id)?);
//!     session.exit()
//! }
//! ```

pub mod error;
mod local;
mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{DrmaaError, Result};
pub use local::LocalSession;
pub use session::DrmSession;
