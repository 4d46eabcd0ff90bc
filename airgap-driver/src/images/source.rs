//! Where manifests come from.

use async_trait::async_trait;
use oci_client::Reference;
use oci_client::client::{ClientConfig, ClientProtocol};
use oci_client::manifest::OciManifest;
use oci_client::secrets::RegistryAuth;

use airgap_driver_shared::errors::{DriverError, DriverResult};

/// Manifest and canonical digest for one reference, as the registry reports
/// them.
#[derive(Debug, Clone)]
pub struct RemoteManifest {
    pub manifest: OciManifest,
    pub digest: String,
}

/// Looks up manifests for image references.
///
/// The registry-backed implementation is [`OciRegistrySource`]; tests swap
/// in fixed tables.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch_manifest(&self, reference: &Reference) -> DriverResult<RemoteManifest>;
}

/// Resolves references against their OCI registries with anonymous auth.
pub struct OciRegistrySource {
    client: oci_client::Client,
}

impl std::fmt::Debug for OciRegistrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciRegistrySource").finish()
    }
}

impl OciRegistrySource {
    /// Create a source. Registries listed in `insecure_registries` are
    /// contacted over plain HTTP; all others over HTTPS.
    pub fn new(insecure_registries: Vec<String>) -> Self {
        let protocol = if insecure_registries.is_empty() {
            ClientProtocol::Https
        } else {
            ClientProtocol::HttpsExcept(insecure_registries)
        };

        Self {
            client: oci_client::Client::new(ClientConfig {
                protocol,
                ..Default::default()
            }),
        }
    }
}

impl Default for OciRegistrySource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ManifestSource for OciRegistrySource {
    async fn fetch_manifest(&self, reference: &Reference) -> DriverResult<RemoteManifest> {
        tracing::debug!(reference = %reference, "Pulling manifest");

        let (manifest, digest) = self
            .client
            .pull_manifest(reference, &RegistryAuth::Anonymous)
            .await
            .map_err(|e| DriverError::registry(reference.whole(), e))?;

        Ok(RemoteManifest { manifest, digest })
    }
}
