//! Release asset retrieval: the distribution binary and its image list.
//!
//! Both assets live under one release location:
//! - binary: `{release_base}/{version}/{dist_name}`
//! - image list: `{release_base}/{version}/{dist_name}-images.txt`

mod stream;

pub use stream::AssetStream;

use std::time::Duration;

use airgap_driver_shared::constants::release;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use futures::TryStreamExt;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// Downloads release assets for one distribution.
///
/// Every failure (bad URL, transport error, non-success status) collapses
/// into a single `DriverError::Fetch` carrying the version and URL. Nothing
/// is retried here.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    release_base: String,
    dist_name: String,
    timeout: Duration,
}

impl AssetFetcher {
    /// Create a fetcher for `dist_name` assets under `release_base`.
    ///
    /// `timeout` bounds connecting and waiting for response headers. Body
    /// transfer of the binary is bounded only by cancellation, since release
    /// binaries are large.
    pub fn new(
        release_base: impl Into<String>,
        dist_name: impl Into<String>,
        timeout: Duration,
    ) -> DriverResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("airgap-driver/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DriverError::InvalidArgument(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            release_base: release_base.into().trim_end_matches('/').to_string(),
            dist_name: dist_name.into(),
            timeout,
        })
    }

    pub fn release_base(&self) -> &str {
        &self.release_base
    }

    pub fn binary_url(&self, version: &str) -> String {
        format!("{}/{}/{}", self.release_base, version, self.dist_name)
    }

    pub fn image_list_url(&self, version: &str) -> String {
        format!(
            "{}/{}/{}{}",
            self.release_base,
            version,
            self.dist_name,
            release::IMAGE_LIST_SUFFIX
        )
    }

    /// Start downloading the distribution binary.
    ///
    /// Returns once response headers arrive; the body is streamed through the
    /// returned `AssetStream`.
    pub async fn binary(
        &self,
        version: &str,
        cancel: &CancellationToken,
    ) -> DriverResult<AssetStream> {
        let url = self.binary_url(version);
        tracing::info!(version = %version, url = %url, "Fetching release binary");

        let response = self.get(version, &url, cancel, "binary fetch").await?;
        let content_length = response.content_length();
        let body = response.bytes_stream().map_err(std::io::Error::other);

        Ok(AssetStream::new(
            version,
            url,
            content_length,
            Box::pin(StreamReader::new(body)),
        ))
    }

    /// Download the newline-delimited list of images the release needs.
    ///
    /// Blank lines are skipped. Retained lines are trimmed and returned in
    /// file order, without reordering or deduplication.
    pub async fn image_list(
        &self,
        version: &str,
        cancel: &CancellationToken,
    ) -> DriverResult<Vec<String>> {
        let url = self.image_list_url(version);
        tracing::info!(version = %version, url = %url, "Fetching release image list");

        let read_all = async {
            let response = self.get(version, &url, cancel, "image list fetch").await?;
            let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
            let mut lines = StreamReader::new(body).lines();

            let mut images = Vec::new();
            loop {
                let line = lines.next_line().await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::InvalidData {
                        DriverError::parse(url.clone(), e)
                    } else {
                        DriverError::fetch(version, url.clone(), e)
                    }
                })?;
                match line {
                    Some(line) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            images.push(line.to_string());
                        }
                    }
                    None => break,
                }
            }
            Ok::<_, DriverError>(images)
        };

        let images = tokio::select! {
            _ = cancel.cancelled() => return Err(DriverError::cancelled("image list fetch")),
            result = tokio::time::timeout(self.timeout, read_all) => match result {
                Ok(result) => result?,
                Err(_) => {
                    return Err(DriverError::fetch(
                        version,
                        url.clone(),
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
            },
        };

        tracing::debug!(version = %version, count = images.len(), "Read release image list");
        Ok(images)
    }

    async fn get(
        &self,
        version: &str,
        url: &str,
        cancel: &CancellationToken,
        operation: &str,
    ) -> DriverResult<reqwest::Response> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| DriverError::fetch(version, url, format!("invalid URL: {e}")))?;

        let send = tokio::time::timeout(self.timeout, self.client.get(parsed).send());
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(DriverError::cancelled(operation)),
            result = send => match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(DriverError::fetch(version, url, e)),
                Err(_) => {
                    return Err(DriverError::fetch(
                        version,
                        url,
                        format!("no response within {:?}", self.timeout),
                    ));
                }
            },
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::fetch(
                version,
                url,
                format!("unexpected status {status}"),
            ));
        }

        Ok(response)
    }
}
