//! Image resolution for air-gapped bundles.
//!
//! This module provides:
//! - `ImageResolver`: turns raw references into resolved manifests, all or nothing
//! - `ManifestSource`: the seam between resolution policy and registry access
//! - `OciRegistrySource`: registry-backed source built on `oci_client`

mod source;

pub use source::{ManifestSource, OciRegistrySource, RemoteManifest};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use airgap_driver_shared::errors::{
    DriverError, DriverResult, ResolveFailure, ResolveFailureKind,
};
use futures::StreamExt;
use oci_client::Reference;
use oci_client::manifest::OciManifest;
use tokio_util::sync::CancellationToken;

/// Default number of registry lookups in flight at once.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 8;

/// A reference pinned to the manifest its registry currently serves.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub reference: Reference,
    /// Canonical manifest digest (sha256:...)
    pub digest: String,
    pub manifest: OciManifest,
}

impl ResolvedImage {
    /// `registry/repository@digest` form of the reference.
    pub fn pinned(&self) -> String {
        format!(
            "{}/{}@{}",
            self.reference.registry(),
            self.reference.repository(),
            self.digest
        )
    }

    /// Manifest serialized as JSON, the form bundle stores persist.
    pub fn manifest_json(&self) -> DriverResult<Vec<u8>> {
        serde_json::to_vec(&self.manifest).map_err(|e| {
            DriverError::parse(
                self.reference.whole(),
                format!("failed to serialize manifest: {e}"),
            )
        })
    }
}

/// Resolves image references through a [`ManifestSource`].
///
/// Resolution is all-or-nothing: any failure fails the whole call and names
/// every failing reference.
#[derive(Clone)]
pub struct ImageResolver {
    source: Arc<dyn ManifestSource>,
    concurrency: usize,
}

impl std::fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolver")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl ImageResolver {
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self {
            source,
            concurrency: DEFAULT_RESOLVE_CONCURRENCY,
        }
    }

    /// Limit the number of concurrent registry lookups (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve every reference in `refs`.
    ///
    /// Duplicate references are looked up once and appear once in the
    /// result, keyed by the raw reference string.
    ///
    /// # Returns
    /// * `Ok(map)` - Every reference resolved
    /// * `Err(DriverError::Resolve)` - At least one reference failed; lists all
    ///   failures in input order
    /// * `Err(DriverError::Cancelled)` - `cancel` fired; in-flight lookups are dropped
    pub async fn resolve(
        &self,
        refs: &[String],
        cancel: &CancellationToken,
    ) -> DriverResult<BTreeMap<String, ResolvedImage>> {
        let unique: Vec<(usize, String)> = {
            let mut seen = HashSet::new();
            refs.iter()
                .filter(|r| seen.insert(r.as_str()))
                .cloned()
                .enumerate()
                .collect()
        };
        let total = unique.len();

        tracing::info!(
            count = total,
            concurrency = self.concurrency,
            "Resolving images"
        );

        let lookups = futures::stream::iter(unique)
            .map(|(index, raw)| async move {
                let outcome = self.resolve_one(&raw).await;
                (index, raw, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>();

        let mut outcomes = tokio::select! {
            _ = cancel.cancelled() => return Err(DriverError::cancelled("image resolution")),
            outcomes = lookups => outcomes,
        };
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut resolved = BTreeMap::new();
        let mut failures = Vec::new();
        for (_, raw, outcome) in outcomes {
            match outcome {
                Ok(image) => {
                    resolved.insert(raw, image);
                }
                Err((kind, reason)) => failures.push(ResolveFailure {
                    reference: raw,
                    reason,
                    kind,
                }),
            }
        }

        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                total,
                "Image resolution failed"
            );
            return Err(DriverError::Resolve { failures });
        }

        tracing::info!(count = resolved.len(), "Resolved images");
        Ok(resolved)
    }

    async fn resolve_one(
        &self,
        raw: &str,
    ) -> Result<ResolvedImage, (ResolveFailureKind, String)> {
        let reference: Reference = raw.parse().map_err(|e| {
            (
                ResolveFailureKind::InvalidReference,
                format!("invalid image reference: {e}"),
            )
        })?;

        let remote = self
            .source
            .fetch_manifest(&reference)
            .await
            .map_err(|e| (ResolveFailureKind::Registry, e.to_string()))?;

        tracing::debug!(reference = %raw, digest = %remote.digest, "Resolved image");
        Ok(ResolvedImage {
            reference,
            digest: remote.digest,
            manifest: remote.manifest,
        })
    }
}
