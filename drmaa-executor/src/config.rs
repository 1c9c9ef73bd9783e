//! Executor settings
//!
//! Defines the options a host passes to the executor: native arguments for
//! every submission, where job output goes, how fast the DRM may be polled
//! and what happens when a jobscript cannot be removed.
//!
//! Settings can be flattened into a host's clap command line or read from
//! the environment with [`ExecutorSettings::from_env`].

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ExecutorError, Result};

/// Default upper bound on DRM status queries per second
pub const DEFAULT_MAX_STATUS_CHECKS_PER_SECOND: u32 = 10;

/// What to do when a finished job's jobscript cannot be removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCleanup {
    /// Surface the failure to the host as an executor error
    #[default]
    Propagate,
    /// Log a warning and carry on
    Warn,
}

/// Executor settings
#[derive(Debug, Clone, PartialEq, Args, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Args passed to each DRMAA job submission, e.g. '-pe threaded {threads}'.
    ///
    /// Job properties (name, rule, input, output, params, wildcards, log,
    /// threads, resources and dependencies) are interpolated.
    #[arg(long = "drmaa-args", env = "DRMAA_ARGS", allow_hyphen_values = true)]
    pub args: Option<String>,

    /// Directory for the stdout and stderr files of DRMAA jobs.
    ///
    /// Relative paths are resolved against the current directory. Overrides
    /// any '-o' or '-e' given in the native arguments.
    #[arg(long = "drmaa-log-dir", env = "DRMAA_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Maximum number of job status queries per second
    #[arg(
        long,
        env = "DRMAA_MAX_STATUS_CHECKS_PER_SECOND",
        default_value_t = DEFAULT_MAX_STATUS_CHECKS_PER_SECOND
    )]
    pub max_status_checks_per_second: u32,

    /// Policy for jobscripts that cannot be removed after a job finished
    #[arg(
        long,
        env = "DRMAA_ARTIFACT_CLEANUP",
        value_enum,
        default_value_t = ArtifactCleanup::Propagate
    )]
    pub artifact_cleanup: ArtifactCleanup,

    /// Working directory shared by this host and the cluster nodes
    ///
    /// When set, jobscripts change into it before running.
    #[arg(long, env = "DRMAA_COMMON_WORKDIR")]
    pub common_workdir: Option<PathBuf>,
}

impl ExecutorSettings {
    /// Creates settings with defaults
    pub fn new() -> Self {
        Self {
            args: None,
            log_dir: None,
            max_status_checks_per_second: DEFAULT_MAX_STATUS_CHECKS_PER_SECOND,
            artifact_cleanup: ArtifactCleanup::Propagate,
            common_workdir: None,
        }
    }

    /// Creates settings from environment variables
    ///
    /// Recognized environment variables:
    /// - DRMAA_ARGS (optional)
    /// - DRMAA_LOG_DIR (optional)
    /// - DRMAA_MAX_STATUS_CHECKS_PER_SECOND (optional, default: 10)
    /// - DRMAA_ARTIFACT_CLEANUP (optional, `propagate` or `warn`)
    /// - DRMAA_COMMON_WORKDIR (optional)
    pub fn from_env() -> Result<Self> {
        let max_status_checks_per_second = match std::env::var("DRMAA_MAX_STATUS_CHECKS_PER_SECOND")
        {
            Ok(value) => value.parse::<u32>().map_err(|_| {
                ExecutorError::Config(format!(
                    "DRMAA_MAX_STATUS_CHECKS_PER_SECOND must be a number, got '{}'",
                    value
                ))
            })?,
            Err(_) => DEFAULT_MAX_STATUS_CHECKS_PER_SECOND,
        };

        let artifact_cleanup = match std::env::var("DRMAA_ARTIFACT_CLEANUP") {
            Ok(value) => ArtifactCleanup::from_str(&value, true).map_err(|_| {
                ExecutorError::Config(format!(
                    "DRMAA_ARTIFACT_CLEANUP must be 'propagate' or 'warn', got '{}'",
                    value
                ))
            })?,
            Err(_) => ArtifactCleanup::default(),
        };

        Ok(Self {
            args: std::env::var("DRMAA_ARGS").ok(),
            log_dir: std::env::var_os("DRMAA_LOG_DIR").map(PathBuf::from),
            max_status_checks_per_second,
            artifact_cleanup,
            common_workdir: std::env::var_os("DRMAA_COMMON_WORKDIR").map(PathBuf::from),
        })
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    pub fn with_artifact_cleanup(mut self, policy: ArtifactCleanup) -> Self {
        self.artifact_cleanup = policy;
        self
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if self.max_status_checks_per_second == 0 {
            return Err(ExecutorError::Config(
                "max_status_checks_per_second must be greater than 0".to_string(),
            ));
        }

        if let Some(log_dir) = &self.log_dir {
            if log_dir.as_os_str().is_empty() {
                return Err(ExecutorError::Config("log_dir cannot be empty".to_string()));
            }
            if log_dir.exists() && !log_dir.is_dir() {
                return Err(ExecutorError::Config(format!(
                    "log_dir {} is not a directory",
                    log_dir.display()
                )));
            }
        }

        Ok(())
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::new()
    }
}
