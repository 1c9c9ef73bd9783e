//! Job template domain types
//!
//! A job template is the DRM's submission request. It is allocated from a
//! session, filled in for exactly one submission and released afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Session-scoped handle of an allocated job template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub u64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jt-{}", self.0)
    }
}

/// Attributes of a single job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub id: TemplateId,
    pub remote_command: PathBuf,
    pub args: Vec<String>,
    /// Passed verbatim to the underlying scheduler
    pub native_specification: String,
    /// `[hostname]:path` spec for the job's standard output
    pub output_path: Option<String>,
    /// `[hostname]:path` spec for the job's standard error
    pub error_path: Option<String>,
    pub job_name: Option<String>,
    pub working_directory: Option<PathBuf>,
}

impl JobTemplate {
    /// Creates an empty template bound to an allocated id
    pub fn new(id: TemplateId) -> Self {
        Self {
            id,
            remote_command: PathBuf::new(),
            args: Vec::new(),
            native_specification: String::new(),
            output_path: None,
            error_path: None,
            job_name: None,
            working_directory: None,
        }
    }

    /// Formats a host-less path spec (`:path`) accepted by the DRM
    pub fn path_spec(path: &Path) -> String {
        format!(":{}", path.display())
    }

    /// Splits a `[hostname]:path` spec into its host and path parts
    ///
    /// A spec without a colon is treated as a bare path.
    pub fn split_path_spec(spec: &str) -> (Option<&str>, &Path) {
        match spec.split_once(':') {
            Some(("", path)) => (None, Path::new(path)),
            Some((host, path)) => (Some(host), Path::new(path)),
            None => (None, Path::new(spec)),
        }
    }
}
