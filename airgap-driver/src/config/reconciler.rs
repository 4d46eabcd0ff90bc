//! Reconcile distribution defaults with the user's on-disk config file.

use std::path::{Path, PathBuf};

use airgap_driver_shared::constants::config_file;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use serde_yaml::{Mapping, Value};

use super::ClusterConfig;
use super::merge::{merge_mappings, sort_keys};
use crate::util::fs::write_atomic;

/// Merges a driver's default `ClusterConfig` with the user's config file and
/// persists the result.
///
/// The reconciler assumes exclusive access to the config directory. Callers
/// that may run concurrent bootstrap attempts should hold a
/// [`ConfigLock`](super::ConfigLock) around [`persist`](Self::persist).
#[derive(Debug, Clone)]
pub struct ConfigReconciler {
    defaults: ClusterConfig,
}

impl ConfigReconciler {
    pub fn new(defaults: ClusterConfig) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ClusterConfig {
        &self.defaults
    }

    /// Path the merged config is written to.
    pub fn target_path(&self) -> PathBuf {
        self.defaults.config_path()
    }

    /// Merge defaults with the existing config file and write the result.
    ///
    /// A missing config file is treated as empty. Keys present in the user
    /// file win; defaults only fill keys the user left out. Output keys are
    /// sorted, so identical inputs always produce identical bytes.
    ///
    /// # Returns
    /// Path of the written config file
    pub fn persist(&self) -> DriverResult<PathBuf> {
        let dir = self.defaults.config_dir().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            DriverError::config(&dir, format!("failed to create config directory: {e}"))
        })?;

        let path = dir.join(config_file::FILE_NAME);
        let defaults = self.default_mapping(&path)?;
        let user = load_user_mapping(&path)?;

        tracing::debug!(
            path = %path.display(),
            default_keys = defaults.len(),
            user_keys = user.len(),
            "Reconciling cluster config"
        );

        let merged = sort_keys(Value::Mapping(merge_mappings(defaults, user)));
        let rendered = serde_yaml::to_string(&merged)
            .map_err(|e| DriverError::config(&path, format!("failed to serialize config: {e}")))?;

        write_atomic(&path, rendered.as_bytes(), config_file::MODE)?;
        tracing::info!(path = %path.display(), "Persisted cluster config");
        Ok(path)
    }

    fn default_mapping(&self, path: &Path) -> DriverResult<Mapping> {
        match serde_yaml::to_value(&self.defaults) {
            Ok(Value::Mapping(mapping)) => Ok(mapping),
            Ok(other) => Err(DriverError::config(
                path,
                format!("default config serialized to a non-mapping value: {other:?}"),
            )),
            Err(e) => Err(DriverError::config(
                path,
                format!("failed to serialize default config: {e}"),
            )),
        }
    }
}

/// Load the user's config file as a generic mapping.
///
/// Absence of the file is not an error. An empty or comment-only file is an
/// empty mapping. Anything other than a mapping at the top level is a parse
/// error.
pub(crate) fn load_user_mapping(path: &Path) -> DriverResult<Mapping> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No user config file, using defaults");
            return Ok(Mapping::new());
        }
        Err(e) => {
            return Err(DriverError::config(
                path,
                format!("failed to read config file: {e}"),
            ));
        }
    };

    if contents.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let source = path.display().to_string();
    match serde_yaml::from_str::<Value>(&contents) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(DriverError::parse(
            source,
            "expected a mapping at the top level",
        )),
        Err(e) => Err(DriverError::parse(source, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn defaults_in(root: &Path) -> ClusterConfig {
        ClusterConfig {
            data_dir: root.join("data"),
            kube_config: root.join("etc").join("k3s.yaml"),
            kube_config_mode: "0644".to_string(),
            disable: vec![],
        }
    }

    #[test]
    fn test_persist_without_user_file_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        let reconciler = ConfigReconciler::new(defaults.clone());

        let path = reconciler.persist().unwrap();
        assert_eq!(path, temp_dir.path().join("etc").join("config.yaml"));

        let written: ClusterConfig =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, defaults);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("disable"));
    }

    #[test]
    fn test_persist_creates_missing_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let mut defaults = defaults_in(temp_dir.path());
        defaults.kube_config = temp_dir.path().join("a/b/c/k3s.yaml");

        let path = ConfigReconciler::new(defaults).persist().unwrap();
        assert!(path.exists());
        assert!(temp_dir.path().join("a/b/c").is_dir());
    }

    #[test]
    fn test_persist_sets_fixed_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigReconciler::new(defaults_in(temp_dir.path()))
            .persist()
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_user_disable_list_wins_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        std::fs::create_dir_all(defaults.config_dir()).unwrap();
        std::fs::write(
            defaults.config_path(),
            "disable:\n  - traefik\n  - servicelb\n  - traefik\n",
        )
        .unwrap();

        let path = ConfigReconciler::new(defaults.clone()).persist().unwrap();
        let written: ClusterConfig =
            serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(written.disable, vec!["traefik", "servicelb", "traefik"]);
        assert_eq!(written.data_dir, defaults.data_dir);
        assert_eq!(written.kube_config_mode, "0644");
    }

    #[test]
    fn test_user_keys_override_and_unknown_keys_survive() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        std::fs::create_dir_all(defaults.config_dir()).unwrap();
        std::fs::write(
            defaults.config_path(),
            "write-kubeconfig-mode: '0600'\nnode-name: edge-01\n",
        )
        .unwrap();

        let path = ConfigReconciler::new(defaults).persist().unwrap();
        let merged: Mapping =
            serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(
            merged.get("write-kubeconfig-mode").and_then(Value::as_str),
            Some("0600")
        );
        assert_eq!(
            merged.get("node-name").and_then(Value::as_str),
            Some("edge-01")
        );
        assert!(merged.contains_key("data-dir"));
    }

    #[test]
    fn test_persist_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        std::fs::create_dir_all(defaults.config_dir()).unwrap();
        std::fs::write(defaults.config_path(), "zeta: 1\ndisable: [traefik]\n").unwrap();

        let reconciler = ConfigReconciler::new(defaults);
        let path = reconciler.persist().unwrap();
        let first = std::fs::read(&path).unwrap();
        reconciler.persist().unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_output_keys_are_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        std::fs::create_dir_all(defaults.config_dir()).unwrap();
        std::fs::write(defaults.config_path(), "zeta: 1\nalpha: 2\n").unwrap();

        let path = ConfigReconciler::new(defaults).persist().unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let keys: Vec<&str> = raw
            .lines()
            .filter_map(|line| line.split(':').next())
            .collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_malformed_user_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        std::fs::create_dir_all(defaults.config_dir()).unwrap();
        std::fs::write(defaults.config_path(), "disable: [traefik\n").unwrap();

        let err = ConfigReconciler::new(defaults.clone()).persist().unwrap_err();
        assert!(matches!(err, DriverError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_non_mapping_user_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let defaults = defaults_in(temp_dir.path());
        std::fs::create_dir_all(defaults.config_dir()).unwrap();
        std::fs::write(defaults.config_path(), "- traefik\n- servicelb\n").unwrap();

        let err = ConfigReconciler::new(defaults).persist().unwrap_err();
        assert!(matches!(err, DriverError::Parse { .. }));
    }

    #[test]
    fn test_comment_only_user_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "# managed by hand\n").unwrap();

        assert!(load_user_mapping(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_directory_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut defaults = defaults_in(temp_dir.path());
        defaults.kube_config = blocker.join("k3s.yaml");

        let err = ConfigReconciler::new(defaults).persist().unwrap_err();
        assert!(matches!(err, DriverError::Config { .. }));
        assert!(err.to_string().contains("blocker"));
    }
}
