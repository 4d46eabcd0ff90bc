//! Air-gap Driver - Kubernetes distribution drivers for disconnected installs
//!
//! A driver knows how to fetch one distribution's release assets, enumerate
//! and resolve the images it needs, persist its configuration, and run its
//! install script. Orchestrators select drivers by name through the
//! registry and only ever talk to `dyn Driver`.

pub mod bootstrap;
pub mod config;
pub mod driver;
pub mod fetch;
pub mod images;
pub mod readiness;
pub mod util;

pub use airgap_driver_shared::errors::{
    DriverError, DriverResult, ResolveFailure, ResolveFailureKind,
};
pub use bootstrap::{Bootstrapper, InitScript};
pub use config::{ClusterConfig, ConfigLock, ConfigReconciler};
pub use driver::{Driver, DriverOptions, available_drivers, create_driver, is_registered};
pub use fetch::{AssetFetcher, AssetStream};
pub use images::{ImageResolver, ManifestSource, OciRegistrySource, RemoteManifest, ResolvedImage};
pub use readiness::{ReadinessCatalog, ReadinessObject};
pub use util::init_file_logging;

/// Registry reference type used by [`images`].
pub use oci_client::Reference;
