//! Jobscript cleanup
//!
//! Removes the transient jobscript of a job once it leaves tracking and
//! applies the configured [`ArtifactCleanup`] policy when that fails.

use std::path::Path;
use tracing::{debug, warn};

use crate::config::ArtifactCleanup;
use crate::error::{ExecutorError, Result};

/// Removes jobscripts according to a cleanup policy
#[derive(Debug, Clone, Copy)]
pub struct JobscriptCleaner {
    policy: ArtifactCleanup,
}

impl JobscriptCleaner {
    pub fn new(policy: ArtifactCleanup) -> Self {
        Self { policy }
    }

    /// Removes `jobscript`
    ///
    /// Under [`ArtifactCleanup::Warn`] failures are logged and swallowed.
    pub fn remove(&self, jobscript: &Path) -> Result<()> {
        match std::fs::remove_file(jobscript) {
            Ok(()) => {
                debug!("Removed jobscript {}", jobscript.display());
                Ok(())
            }
            Err(source) => match self.policy {
                ArtifactCleanup::Propagate => Err(ExecutorError::Artifact {
                    path: jobscript.to_path_buf(),
                    source,
                }),
                ArtifactCleanup::Warn => {
                    warn!(
                        "Failed to remove jobscript {}: {}",
                        jobscript.display(),
                        source
                    );
                    Ok(())
                }
            },
        }
    }
}
