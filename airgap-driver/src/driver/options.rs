//! Construction options shared by every distribution driver.

use std::path::PathBuf;
use std::time::Duration;

use airgap_driver_shared::constants::envs as const_envs;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use serde::{Deserialize, Serialize};

use crate::bootstrap::InitScript;
use crate::config::ClusterConfig;
use crate::images::DEFAULT_RESOLVE_CONCURRENCY;

/// Default directory the install script and binaries land in.
pub const DEFAULT_INSTALL_DIR: &str = "/opt/airgap/bin";

/// Default bound on connecting and receiving response headers.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Options passed to a driver factory.
///
/// Fields left at their defaults fall back to distribution defaults:
/// `release_base: None` selects the distribution's public release server and
/// `cluster: None` its built-in cluster configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Release version to install (e.g. "v1.22.2+k3s2")
    pub version: String,

    /// Override of the release download location.
    ///
    /// Defaults to `AIRGAP_DRIVER_RELEASE_BASE` when set.
    pub release_base: Option<String>,

    /// Directory receiving the install script and binaries.
    ///
    /// Defaults to `AIRGAP_DRIVER_INSTALL_DIR`, else `/opt/airgap/bin`.
    pub install_dir: PathBuf,

    pub http_timeout_secs: u64,

    /// Maximum registry lookups in flight while resolving images
    pub resolve_concurrency: usize,

    /// Registries reached over plain HTTP instead of HTTPS
    pub insecure_registries: Vec<String>,

    /// Install without starting the service (dry run)
    pub skip_start: bool,

    /// Install script payload. `start` fails without one.
    pub init_script: Option<InitScript>,

    /// Replaces the distribution's default cluster configuration.
    pub cluster: Option<ClusterConfig>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        let install_dir = std::env::var(const_envs::INSTALL_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_INSTALL_DIR));
        let release_base = std::env::var(const_envs::RELEASE_BASE).ok();

        Self {
            version: String::new(),
            release_base,
            install_dir,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            resolve_concurrency: DEFAULT_RESOLVE_CONCURRENCY,
            insecure_registries: Vec::new(),
            skip_start: false,
            init_script: None,
            cluster: None,
        }
    }
}

impl DriverOptions {
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_release_base(mut self, release_base: impl Into<String>) -> Self {
        self.release_base = Some(release_base.into());
        self
    }

    pub fn with_install_dir(mut self, install_dir: impl Into<PathBuf>) -> Self {
        self.install_dir = install_dir.into();
        self
    }

    /// Set the HTTP timeout (whole seconds, rounded down)
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_resolve_concurrency(mut self, concurrency: usize) -> Self {
        self.resolve_concurrency = concurrency;
        self
    }

    pub fn with_insecure_registry(mut self, registry: impl Into<String>) -> Self {
        self.insecure_registries.push(registry.into());
        self
    }

    pub fn with_skip_start(mut self, skip_start: bool) -> Self {
        self.skip_start = skip_start;
        self
    }

    pub fn with_init_script(mut self, script: impl Into<InitScript>) -> Self {
        self.init_script = Some(script.into());
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Check the options every distribution depends on.
    pub fn validate(&self) -> DriverResult<()> {
        if self.version.trim().is_empty() {
            return Err(DriverError::InvalidArgument(
                "a release version is required".to_string(),
            ));
        }
        if self
            .version
            .chars()
            .any(|c| c.is_whitespace() || c == '/')
        {
            return Err(DriverError::InvalidArgument(format!(
                "release version '{}' must not contain whitespace or '/'",
                self.version
            )));
        }

        if !self.install_dir.is_absolute() {
            return Err(DriverError::InvalidArgument(format!(
                "install_dir must be an absolute path, got '{}'",
                self.install_dir.display()
            )));
        }

        if self.http_timeout_secs == 0 {
            return Err(DriverError::InvalidArgument(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.resolve_concurrency == 0 {
            return Err(DriverError::InvalidArgument(
                "resolve_concurrency must be greater than zero".to_string(),
            ));
        }

        if let Some(cluster) = &self.cluster {
            cluster.validate()?;
        }
        Ok(())
    }
}
