//! Cluster configuration owned by a driver.
//!
//! - `ClusterConfig`: typed defaults a distribution starts from
//! - `ConfigReconciler`: merges those defaults with the on-disk user file
//! - `ConfigLock`: serializes bootstrap attempts against one directory

mod lock;
mod merge;
mod reconciler;

pub use lock::ConfigLock;
pub use merge::{merge_mappings, sort_keys};
pub use reconciler::ConfigReconciler;

use std::path::{Path, PathBuf};

use airgap_driver_shared::constants::config_file;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use serde::{Deserialize, Serialize};

/// Distribution configuration persisted next to the kube-config.
///
/// Field names follow the distribution's own config file keys. Empty fields
/// are omitted on serialization so they never shadow values the
/// distribution would otherwise pick itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Root directory for distribution state
    #[serde(rename = "data-dir", skip_serializing_if = "path_is_empty")]
    pub data_dir: PathBuf,

    /// Where the distribution writes the admin kube-config
    #[serde(rename = "write-kubeconfig", skip_serializing_if = "path_is_empty")]
    pub kube_config: PathBuf,

    /// Octal file mode of the written kube-config (e.g. "0644")
    #[serde(rename = "write-kubeconfig-mode", skip_serializing_if = "String::is_empty")]
    pub kube_config_mode: String,

    /// Packaged components to disable, in order. Duplicates are kept.
    #[serde(rename = "disable", skip_serializing_if = "Vec::is_empty")]
    pub disable: Vec<String>,
}

#[allow(clippy::ptr_arg)]
fn path_is_empty(path: &PathBuf) -> bool {
    path.as_os_str().is_empty()
}

impl ClusterConfig {
    /// Directory holding the kube-config and the persisted config file.
    pub fn config_dir(&self) -> &Path {
        self.kube_config.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Path of the persisted config file.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join(config_file::FILE_NAME)
    }

    /// Parse `kube_config_mode` into permission bits.
    pub fn kube_config_mode_bits(&self) -> DriverResult<u32> {
        parse_mode(&self.kube_config_mode)
    }

    /// Check that paths are absolute and the mode string is a valid octal mode.
    pub fn validate(&self) -> DriverResult<()> {
        for (field, path) in [
            (config_file::keys::DATA_DIR, &self.data_dir),
            (config_file::keys::WRITE_KUBECONFIG, &self.kube_config),
        ] {
            if !path.is_absolute() {
                return Err(DriverError::InvalidArgument(format!(
                    "{} must be an absolute path, got '{}'",
                    field,
                    path.display()
                )));
            }
        }

        if self.kube_config.file_name().is_none() {
            return Err(DriverError::InvalidArgument(format!(
                "{} must name a file, got '{}'",
                config_file::keys::WRITE_KUBECONFIG,
                self.kube_config.display()
            )));
        }

        self.kube_config_mode_bits()?;
        Ok(())
    }
}

fn parse_mode(mode: &str) -> DriverResult<u32> {
    let invalid = || {
        DriverError::InvalidArgument(format!(
            "{} must be an octal mode such as 0644, got '{}'",
            config_file::keys::WRITE_KUBECONFIG_MODE,
            mode
        ))
    };

    let digits = mode.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    if digits.is_empty() || digits.len() > 5 {
        return Err(invalid());
    }

    let bits = u32::from_str_radix(digits, 8).map_err(|_| invalid())?;
    if bits > 0o7777 {
        return Err(invalid());
    }
    Ok(bits)
}
