//! K3s distribution driver.

pub mod constants;
mod factory;

pub use factory::K3sFactory;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use airgap_driver_shared::constants::script;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::{Bootstrapper, InitScript};
use crate::config::{ClusterConfig, ConfigLock, ConfigReconciler};
use crate::driver::{Driver, DriverOptions};
use crate::fetch::{AssetFetcher, AssetStream};
use crate::images::{ImageResolver, ManifestSource, OciRegistrySource, ResolvedImage};
use crate::readiness::{ReadinessCatalog, ReadinessObject};

/// Driver for air-gapped k3s installs.
#[derive(Debug)]
pub struct K3s {
    version: String,
    reconciler: ConfigReconciler,
    fetcher: AssetFetcher,
    resolver: ImageResolver,
    readiness: ReadinessCatalog,
    install_dir: PathBuf,
    skip_start: bool,
    resolve_concurrency: usize,
    init_script: Option<InitScript>,
}

impl K3s {
    /// Create a k3s driver.
    ///
    /// # Returns
    /// * `Ok(K3s)` - Options and cluster configuration are valid
    /// * `Err(DriverError::InvalidArgument)` - Missing version, relative paths or a bad mode
    pub fn new(options: DriverOptions) -> DriverResult<Self> {
        options.validate()?;

        let cluster = options.cluster.unwrap_or_else(default_cluster);
        cluster.validate()?;

        let release_base = options
            .release_base
            .unwrap_or_else(|| constants::RELEASE_BASE.to_string());
        let fetcher = AssetFetcher::new(
            release_base,
            constants::NAME,
            std::time::Duration::from_secs(options.http_timeout_secs),
        )?;

        let resolver =
            ImageResolver::new(Arc::new(OciRegistrySource::new(options.insecure_registries)))
                .with_concurrency(options.resolve_concurrency);

        let readiness = ReadinessCatalog::new(
            constants::SYSTEM_DEPLOYMENTS
                .iter()
                .map(|(namespace, name)| ReadinessObject::deployment(*namespace, *name))
                .collect(),
        );

        tracing::debug!(
            version = %options.version,
            release_base = %fetcher.release_base(),
            data_dir = %cluster.data_dir.display(),
            "Created k3s driver"
        );

        Ok(Self {
            version: options.version,
            reconciler: ConfigReconciler::new(cluster),
            fetcher,
            resolver,
            readiness,
            install_dir: options.install_dir,
            skip_start: options.skip_start,
            resolve_concurrency: options.resolve_concurrency,
            init_script: options.init_script,
        })
    }

    /// Replace the registry-backed manifest source, e.g. with a mirror client.
    pub fn with_manifest_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.resolver = ImageResolver::new(source).with_concurrency(self.resolve_concurrency);
        self
    }

    pub fn cluster(&self) -> &ClusterConfig {
        self.reconciler.defaults()
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Where the install script is materialized while `start` runs.
    pub fn script_path(&self) -> PathBuf {
        self.install_dir
            .join(format!("{}{}", constants::NAME, script::FILE_SUFFIX))
    }

    /// Where `binary` should be persisted for the install script to find it.
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(constants::NAME)
    }

    /// Environment the install script runs with, on top of the inherited one.
    pub fn env_overlay(&self) -> Vec<(String, String)> {
        use constants::install_env;

        let mut env = vec![
            (install_env::SKIP_DOWNLOAD.to_string(), "true".to_string()),
            (install_env::SELINUX_WARN.to_string(), "true".to_string()),
            (install_env::SKIP_SELINUX_RPM.to_string(), "true".to_string()),
            (
                install_env::BIN_DIR.to_string(),
                self.install_dir.to_string_lossy().into_owned(),
            ),
        ];
        if self.skip_start {
            env.push((install_env::SKIP_START.to_string(), "true".to_string()));
        }
        env
    }

    /// Take the directory lock guarding this driver's data directory.
    pub fn lock(&self) -> DriverResult<ConfigLock> {
        ConfigLock::acquire(&self.cluster().data_dir)
    }
}

fn default_cluster() -> ClusterConfig {
    ClusterConfig {
        data_dir: PathBuf::from(constants::defaults::DATA_DIR),
        kube_config: PathBuf::from(constants::defaults::KUBE_CONFIG),
        kube_config_mode: constants::defaults::KUBE_CONFIG_MODE.to_string(),
        disable: Vec::new(),
    }
}

#[async_trait]
impl Driver for K3s {
    fn name(&self) -> &str {
        constants::NAME
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn kube_config_path(&self) -> &Path {
        &self.cluster().kube_config
    }

    fn data_path(&self, elems: &[&str]) -> PathBuf {
        elems
            .iter()
            .fold(self.cluster().data_dir.clone(), |path, elem| path.join(elem))
    }

    fn config_path(&self) -> PathBuf {
        self.reconciler.target_path()
    }

    fn write_config(&self) -> DriverResult<PathBuf> {
        self.reconciler.persist()
    }

    async fn image_list(&self, cancel: &CancellationToken) -> DriverResult<Vec<String>> {
        self.fetcher.image_list(&self.version, cancel).await
    }

    async fn images(
        &self,
        cancel: &CancellationToken,
    ) -> DriverResult<BTreeMap<String, ResolvedImage>> {
        let refs = self.image_list(cancel).await?;
        self.resolver.resolve(&refs, cancel).await
    }

    async fn binary(&self, cancel: &CancellationToken) -> DriverResult<AssetStream> {
        self.fetcher.binary(&self.version, cancel).await
    }

    fn system_objects(&self) -> &[ReadinessObject] {
        self.readiness.objects()
    }

    async fn start(
        &self,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> DriverResult<()> {
        let script = match &self.init_script {
            Some(script) if !script.is_empty() => script.clone(),
            _ => {
                return Err(DriverError::InvalidArgument(format!(
                    "no install script payload configured for {}",
                    constants::NAME
                )));
            }
        };

        tracing::info!(
            version = %self.version,
            skip_start = self.skip_start,
            "Bootstrapping k3s"
        );

        Bootstrapper::new(script, self.script_path(), self.env_overlay())
            .run(out, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> DriverOptions {
        DriverOptions::default()
            .with_version("v1.22.2+k3s2")
            .with_install_dir("/opt/airgap/bin")
    }

    #[test]
    fn test_defaults() {
        let k3s = K3s::new(options()).unwrap();

        assert_eq!(k3s.name(), "k3s");
        assert_eq!(k3s.version(), "v1.22.2+k3s2");
        assert_eq!(k3s.kube_config_path(), Path::new("/etc/rancher/k3s/k3s.yaml"));
        assert_eq!(k3s.config_path(), PathBuf::from("/etc/rancher/k3s/config.yaml"));
        assert_eq!(k3s.cluster().kube_config_mode, "0644");
        assert!(k3s.cluster().disable.is_empty());
    }

    #[test]
    fn test_data_path_joins_elements() {
        let k3s = K3s::new(options()).unwrap();

        assert_eq!(k3s.data_path(&[]), PathBuf::from("/var/lib/rancher/k3s"));
        assert_eq!(
            k3s.data_path(&["agent", "images"]),
            PathBuf::from("/var/lib/rancher/k3s/agent/images")
        );
    }

    #[test]
    fn test_system_objects_is_coredns_only() {
        let k3s = K3s::new(options()).unwrap();

        let objects = k3s.system_objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(
            objects[0],
            ReadinessObject::new("kube-system", "coredns", "Deployment", "apps")
        );
    }

    #[test]
    fn test_env_overlay() {
        let k3s = K3s::new(options()).unwrap();
        let env = k3s.env_overlay();

        assert_eq!(
            env,
            vec![
                ("INSTALL_K3S_SKIP_DOWNLOAD".to_string(), "true".to_string()),
                ("INSTALL_K3S_SELINUX_WARN".to_string(), "true".to_string()),
                ("INSTALL_K3S_SKIP_SELINUX_RPM".to_string(), "true".to_string()),
                ("INSTALL_K3S_BIN_DIR".to_string(), "/opt/airgap/bin".to_string()),
            ]
        );
    }

    #[test]
    fn test_skip_start_adds_dry_run_flag() {
        let k3s = K3s::new(options().with_skip_start(true)).unwrap();
        assert!(
            k3s.env_overlay()
                .contains(&("INSTALL_K3S_SKIP_START".to_string(), "true".to_string()))
        );
    }

    #[test]
    fn test_script_and_binary_paths() {
        let k3s = K3s::new(options()).unwrap();
        assert_eq!(k3s.script_path(), PathBuf::from("/opt/airgap/bin/k3s-init.sh"));
        assert_eq!(k3s.binary_path(), PathBuf::from("/opt/airgap/bin/k3s"));
    }

    #[test]
    fn test_release_base_override() {
        let k3s = K3s::new(options().with_release_base("http://mirror.local/k3s/")).unwrap();
        assert_eq!(
            k3s.fetcher.binary_url("v1.22.2+k3s2"),
            "http://mirror.local/k3s/v1.22.2+k3s2/k3s"
        );
    }

    #[test]
    fn test_invalid_cluster_override_rejected() {
        let cluster = ClusterConfig {
            kube_config_mode: "rw-r--r--".to_string(),
            ..default_cluster()
        };
        let err = K3s::new(options().with_cluster(cluster)).unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_start_without_payload_is_rejected() {
        let k3s = K3s::new(options()).unwrap();

        let err = k3s
            .start(&mut tokio::io::sink(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_start_runs_payload_with_overlay() {
        let temp_dir = TempDir::new().unwrap();
        let k3s = K3s::new(
            options()
                .with_install_dir(temp_dir.path())
                .with_skip_start(true)
                .with_init_script(
                    "echo \"bin=$INSTALL_K3S_BIN_DIR skip=$INSTALL_K3S_SKIP_START\"\n",
                ),
        )
        .unwrap();

        let mut out = Vec::new();
        k3s.start(&mut out, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("bin={} skip=true\n", temp_dir.path().display())
        );
        assert!(!k3s.script_path().exists());
    }

    #[test]
    fn test_lock_guards_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let cluster = ClusterConfig {
            data_dir: temp_dir.path().join("data"),
            ..default_cluster()
        };
        let k3s = K3s::new(options().with_cluster(cluster)).unwrap();

        let _held = k3s.lock().unwrap();
        assert!(matches!(k3s.lock(), Err(DriverError::Config { .. })));
    }
}
