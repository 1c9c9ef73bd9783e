//! DRMAA Core
//!
//! Core types shared by the DRMAA session client and the executor.
//!
//! This crate contains:
//! - Domain types: remote job states, control actions, job templates,
//!   tracked submissions and the host's job abstraction
//! - Native-argument interpolation against job attributes

pub mod domain;
pub mod format;

pub use domain::job::{JobControlAction, JobState, RemoteJobId, SubmittedJob, SuspendedBy};
pub use domain::task::{JobHandle, JobSpec, NamedList, WorkflowJob};
pub use domain::template::{JobTemplate, TemplateId};
pub use format::FormatError;
