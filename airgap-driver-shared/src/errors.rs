//! Error types shared by every distribution driver.
//!
//! One enum covers the whole driver contract so orchestrators can match on
//! failure categories without knowing which distribution produced them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across the driver crates.
pub type DriverResult<T> = Result<T, DriverError>;

/// Where a single image resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveFailureKind {
    /// The reference string does not parse; retrying cannot help
    InvalidReference,
    /// The registry lookup failed
    #[default]
    Registry,
}

/// A single image reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveFailure {
    /// Raw reference as it appeared in the image list
    pub reference: String,
    /// Why resolution failed
    pub reason: String,
    #[serde(default)]
    pub kind: ResolveFailureKind,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reference, self.reason)
    }
}

/// Failure categories of the driver contract.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// Creating, reading, serializing or writing the persisted config failed.
    #[error("config error at {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    /// A remote release asset could not be retrieved.
    #[error("failed to fetch {url} for version {version}: {reason}")]
    Fetch {
        version: String,
        url: String,
        reason: String,
    },

    /// An on-disk config file or a downloaded image list is malformed.
    #[error("failed to parse {input}: {reason}")]
    Parse { input: String, reason: String },

    /// The install script could not be launched or exited unsuccessfully.
    #[error("install script {} failed: {reason}", .script.display())]
    Exec { script: PathBuf, reason: String },

    /// A registry lookup for a single reference failed.
    #[error("registry error for {reference}: {reason}")]
    Registry { reference: String, reason: String },

    /// One or more image references could not be resolved.
    #[error("failed to resolve {} image(s): {}", .failures.len(), join_failures(.failures))]
    Resolve { failures: Vec<ResolveFailure> },

    /// The operation observed its cancellation signal.
    #[error("{0} cancelled")]
    Cancelled(String),

    /// No driver is registered under the requested distribution name.
    #[error("unknown distribution '{name}', available: {}", .available.join(", "))]
    UnknownDistribution {
        name: String,
        available: Vec<String>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn join_failures(failures: &[ResolveFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DriverError {
    pub fn config(path: impl AsRef<Path>, reason: impl fmt::Display) -> Self {
        Self::Config {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch(
        version: impl Into<String>,
        url: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::Fetch {
            version: version.into(),
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(input: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    pub fn exec(script: impl AsRef<Path>, reason: impl fmt::Display) -> Self {
        Self::Exec {
            script: script.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn registry(reference: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Registry {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled(operation.into())
    }

    /// Whether a caller-side retry policy may reasonably retry this failure.
    ///
    /// Only network failures qualify. A resolve failure is retryable when at
    /// least one of its references failed at the registry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Registry { .. } => true,
            Self::Resolve { failures } => failures
                .iter()
                .any(|f| f.kind == ResolveFailureKind::Registry),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_carries_version_and_url() {
        let err = DriverError::fetch(
            "v1.22.2+k3s2",
            "https://example.test/v1.22.2+k3s2/k3s",
            "status 404 Not Found",
        );
        let msg = err.to_string();
        assert!(msg.contains("v1.22.2+k3s2"));
        assert!(msg.contains("https://example.test/v1.22.2+k3s2/k3s"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_resolve_error_lists_every_failure() {
        let err = DriverError::Resolve {
            failures: vec![
                ResolveFailure {
                    reference: "docker.io/rancher/missing:v1".into(),
                    reason: "manifest unknown".into(),
                    kind: ResolveFailureKind::Registry,
                },
                ResolveFailure {
                    reference: "ghcr.io/private/img:v2".into(),
                    reason: "unauthorized".into(),
                    kind: ResolveFailureKind::Registry,
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to resolve 2 image(s)"));
        assert!(msg.contains("docker.io/rancher/missing:v1: manifest unknown"));
        assert!(msg.contains("ghcr.io/private/img:v2: unauthorized"));
    }

    #[test]
    fn test_config_error_includes_path() {
        let err = DriverError::config("/etc/rancher/k3s", "permission denied");
        assert_eq!(
            err.to_string(),
            "config error at /etc/rancher/k3s: permission denied"
        );
    }

    #[test]
    fn test_unknown_distribution_lists_available() {
        let err = DriverError::UnknownDistribution {
            name: "rke9".into(),
            available: vec!["k3s".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown distribution 'rke9', available: k3s"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DriverError::fetch("v1", "http://x", "timeout").is_retryable());
        assert!(DriverError::registry("alpine", "timeout").is_retryable());
        assert!(!DriverError::exec("/opt/airgap/bin/k3s-init.sh", "exit 1").is_retryable());
        assert!(!DriverError::cancelled("binary fetch").is_retryable());
    }

    #[test]
    fn test_resolve_retryable_only_with_registry_failures() {
        let invalid = ResolveFailure {
            reference: "Not A Reference!!".into(),
            reason: "invalid image reference".into(),
            kind: ResolveFailureKind::InvalidReference,
        };
        let unreachable = ResolveFailure {
            reference: "docker.io/rancher/pause:3.1".into(),
            reason: "connection refused".into(),
            kind: ResolveFailureKind::Registry,
        };

        let parse_only = DriverError::Resolve {
            failures: vec![invalid.clone()],
        };
        assert!(!parse_only.is_retryable());

        let mixed = DriverError::Resolve {
            failures: vec![invalid, unreachable],
        };
        assert!(mixed.is_retryable());
    }

    #[test]
    fn test_resolve_failure_kind_defaults_to_registry() {
        let failure: ResolveFailure =
            serde_json::from_str(r#"{"reference":"alpine","reason":"timeout"}"#).unwrap();
        assert_eq!(failure.kind, ResolveFailureKind::Registry);
    }
}
