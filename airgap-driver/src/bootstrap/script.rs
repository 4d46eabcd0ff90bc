//! Install script payload and its on-disk lifetime.

use std::fmt;
use std::path::{Path, PathBuf};

use airgap_driver_shared::constants::script;
use airgap_driver_shared::errors::DriverResult;
use serde::{Deserialize, Serialize};

use crate::util::fs::write_atomic;

/// Shell script that installs and starts a distribution.
///
/// The payload is opaque to the driver: packaging supplies it, the driver
/// only writes it to disk and runs it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitScript(String);

impl InitScript {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for InitScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitScript")
            .field("bytes", &self.0.len())
            .finish()
    }
}

impl From<&str> for InitScript {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}

impl From<String> for InitScript {
    fn from(payload: String) -> Self {
        Self(payload)
    }
}

/// Script materialized on disk; removed again when dropped.
#[derive(Debug)]
pub(crate) struct ScriptFile {
    path: PathBuf,
}

impl ScriptFile {
    /// Write `payload` to `path` with mode 0755, creating parent directories.
    pub(crate) fn materialize(payload: &InitScript, path: &Path) -> DriverResult<Self> {
        write_atomic(path, payload.as_str().as_bytes(), script::EXEC_MODE)?;
        tracing::debug!(path = %path.display(), "Materialized install script");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed install script"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove install script"
            ),
        }
    }
}
