//! Shared fixtures for air-gap driver integration tests.
//!
//! - [`ReleaseServer`]: mock release download server
//! - [`StaticManifestSource`]: in-memory registry double
//! - [`k3s_options`] / [`cluster_in`]: driver options rooted in a temp dir

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use airgap_driver::{ClusterConfig, DriverError, DriverOptions, DriverResult};
use airgap_driver::{ManifestSource, Reference, RemoteManifest};
use async_trait::async_trait;
use httpmock::prelude::*;
use httpmock::Mock;
use oci_client::manifest::{OciDescriptor, OciImageManifest, OciManifest};

// ============================================================================
// RELEASE SERVER
// ============================================================================

/// Mock server laid out like a release download location:
/// `/{version}/{asset}`.
pub struct ReleaseServer {
    server: MockServer,
}

impl ReleaseServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start_async().await,
        }
    }

    /// Release base URL to hand to a driver.
    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    /// Full URL of `asset` for `version`.
    pub fn asset_url(&self, version: &str, asset: &str) -> String {
        self.server.url(format!("/{version}/{asset}"))
    }

    /// Serve `body` at `/{version}/{asset}` with status 200.
    pub async fn serve(&self, version: &str, asset: &str, body: impl Into<Vec<u8>>) -> Mock<'_> {
        let path = format!("/{version}/{asset}");
        let body = body.into();
        self.server
            .mock_async(|when, then| {
                when.method(GET).path(path);
                then.status(200).body(body);
            })
            .await
    }

    /// Answer `/{version}/{asset}` with `status` and an empty body.
    pub async fn fail(&self, version: &str, asset: &str, status: u16) -> Mock<'_> {
        let path = format!("/{version}/{asset}");
        self.server
            .mock_async(|when, then| {
                when.method(GET).path(path);
                then.status(status);
            })
            .await
    }

    /// Serve `body` only after `delay`.
    pub async fn serve_slowly(
        &self,
        version: &str,
        asset: &str,
        body: impl Into<Vec<u8>>,
        delay: Duration,
    ) -> Mock<'_> {
        let path = format!("/{version}/{asset}");
        let body = body.into();
        self.server
            .mock_async(|when, then| {
                when.method(GET).path(path);
                then.status(200).delay(delay).body(body);
            })
            .await
    }
}

// ============================================================================
// MANIFEST SOURCE
// ============================================================================

/// Registry double answering from a fixed digest table.
///
/// References are matched by their normalized form, so `alpine:3.14` and
/// `docker.io/library/alpine:3.14` hit the same entry.
#[derive(Default)]
pub struct StaticManifestSource {
    digests: HashMap<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticManifestSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `reference` resolvable to `digest`.
    ///
    /// # Panics
    /// If `reference` does not parse.
    pub fn with_image(mut self, reference: &str, digest: &str) -> Self {
        let parsed: Reference = reference
            .parse()
            .unwrap_or_else(|e| panic!("invalid fixture reference {reference}: {e}"));
        self.digests.insert(parsed.whole(), digest.to_string());
        self
    }

    /// Wait `delay` before answering each lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups served so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestSource for StaticManifestSource {
    async fn fetch_manifest(&self, reference: &Reference) -> DriverResult<RemoteManifest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.digests.get(&reference.whole()) {
            Some(digest) => Ok(RemoteManifest {
                manifest: sample_manifest(),
                digest: digest.clone(),
            }),
            None => Err(DriverError::registry(
                reference.whole(),
                "manifest unknown to registry",
            )),
        }
    }
}

/// Single-layer OCI image manifest.
pub fn sample_manifest() -> OciManifest {
    OciManifest::Image(OciImageManifest {
        config: OciDescriptor {
            media_type: "application/vnd.oci.image.config.v1+json".to_string(),
            digest: "sha256:0000000000000000000000000000000000000000000000000000000000000001"
                .to_string(),
            size: 512,
            ..Default::default()
        },
        layers: vec![OciDescriptor {
            media_type: "application/vnd.oci.image.layer.v1.tar+gzip".to_string(),
            digest: "sha256:0000000000000000000000000000000000000000000000000000000000000002"
                .to_string(),
            size: 1024,
            ..Default::default()
        }],
        ..Default::default()
    })
}

// ============================================================================
// DRIVER OPTIONS
// ============================================================================

/// Cluster configuration with every path under `root`.
pub fn cluster_in(root: &Path) -> ClusterConfig {
    ClusterConfig {
        data_dir: root.join("data"),
        kube_config: root.join("etc").join("k3s.yaml"),
        kube_config_mode: "0644".to_string(),
        disable: Vec::new(),
    }
}

/// k3s options pointed at `release_base`, with all local state under `root`.
pub fn k3s_options(root: &Path, release_base: &str, version: &str) -> DriverOptions {
    DriverOptions::default()
        .with_version(version)
        .with_release_base(release_base)
        .with_install_dir(root.join("bin"))
        .with_http_timeout(Duration::from_secs(5))
        .with_cluster(cluster_in(root))
}
