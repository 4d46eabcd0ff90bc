//! Distribution driver abstraction.
//!
//! The orchestrator only ever sees `dyn Driver`. Concrete distributions
//! register a factory with the compile-time registry and are looked up by
//! name through [`create_driver`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use airgap_driver_shared::errors::DriverResult;
use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::fetch::AssetStream;
use crate::images::ResolvedImage;
use crate::readiness::ReadinessObject;

pub mod factory;
pub mod k3s;
pub mod options;
pub mod registry;

pub use factory::DriverFactory;
pub use options::DriverOptions;
pub use registry::{available_drivers, create_driver, is_registered};

/// Everything the orchestrator needs from a Kubernetes distribution.
///
/// One instance serves one bootstrap attempt; the version is fixed at
/// construction.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Distribution name, also the registry key (e.g. "k3s")
    fn name(&self) -> &str;

    /// Release version this instance installs
    fn version(&self) -> &str;

    /// Where the distribution writes its admin kube-config.
    fn kube_config_path(&self) -> &Path;

    /// Data directory joined with `elems`.
    fn data_path(&self, elems: &[&str]) -> PathBuf;

    /// Where [`Driver::write_config`] persists the merged configuration.
    fn config_path(&self) -> PathBuf;

    /// Merge the driver defaults with any user config on disk and persist
    /// the result.
    ///
    /// # Returns
    /// Path of the written file
    fn write_config(&self) -> DriverResult<PathBuf>;

    /// Image references the release needs, in release order.
    async fn image_list(&self, cancel: &CancellationToken) -> DriverResult<Vec<String>>;

    /// Resolve every image of [`Driver::image_list`], all or nothing.
    async fn images(
        &self,
        cancel: &CancellationToken,
    ) -> DriverResult<BTreeMap<String, ResolvedImage>>;

    /// Start downloading the distribution binary.
    async fn binary(&self, cancel: &CancellationToken) -> DriverResult<AssetStream>;

    /// Objects that must become ready before the cluster accepts workloads.
    fn system_objects(&self) -> &[ReadinessObject];

    /// Run the install script, streaming its stdout into `out`.
    async fn start(
        &self,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> DriverResult<()>;
}
