//! The asset-packaging inspection boundary (`aapt dump badging`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::config::ToolConfig;
use crate::process::{ToolCommand, ToolError};

/// Produces the raw badging dump for one APK on disk.
///
/// Implementations must be shareable across threads: bundle members are
/// inspected independently and possibly concurrently.
pub trait Inspector: Send + Sync + std::fmt::Debug {
    /// Return the textual `dump badging` output for `apk`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if the tool cannot be run, exits non-zero, or
    /// times out.
    fn dump_badging(&self, apk: &Path) -> Result<String, ToolError>;
}

/// [`Inspector`] backed by the `aapt` (or `aapt2`) executable.
#[derive(Debug, Clone)]
pub struct AaptInspector {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl AaptInspector {
    /// Use the executable at `binary`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Locate the tool from configuration, environment, or `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if neither `aapt` nor `aapt2` can be
    /// found.
    pub fn discover(config: &ToolConfig) -> Result<Self, ToolError> {
        Ok(Self::new(config.aapt_path()?).with_timeout(config.timeout()))
    }

    /// Kill inspections that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the executable.
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Inspector for AaptInspector {
    fn dump_badging(&self, apk: &Path) -> Result<String, ToolError> {
        info!(apk = %apk.display(), "inspecting");
        ToolCommand::new(&self.binary)
            .args(["dump", "badging"])
            .arg(apk)
            .timeout(self.timeout)
            .run()
    }
}
