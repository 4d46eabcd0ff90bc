//! Caller-owned response body of a release asset.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use airgap_driver_shared::constants::script;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::util::fs::copy_atomic;

/// Streaming body of a downloaded release asset.
///
/// The HTTP connection stays open until the stream is fully read or dropped.
/// Dropping it early aborts the transfer.
pub struct AssetStream {
    version: String,
    url: String,
    content_length: Option<u64>,
    reader: Pin<Box<dyn AsyncRead + Send>>,
    read_failure: Option<String>,
}

impl fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetStream")
            .field("version", &self.version)
            .field("url", &self.url)
            .field("content_length", &self.content_length)
            .finish()
    }
}

impl AssetStream {
    pub(crate) fn new(
        version: impl Into<String>,
        url: impl Into<String>,
        content_length: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> Self {
        Self {
            version: version.into(),
            url: url.into(),
            content_length,
            reader,
            read_failure: None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Size announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Drain the stream into an executable file at `path`.
    ///
    /// The file appears atomically with mode 0755 once the whole body has
    /// been received. Transport failures mid-body surface as
    /// `DriverError::Fetch`, local write failures as `DriverError::Config`.
    ///
    /// # Returns
    /// Number of bytes written
    pub async fn persist_executable(
        mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> DriverResult<u64> {
        let operation = format!("download of {}", self.url);
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(DriverError::cancelled(operation)),
            result = copy_atomic(&mut self, path, script::EXEC_MODE) => result,
        };

        match result {
            Ok(written) => {
                if let Some(expected) = self.content_length
                    && expected != written
                {
                    let _ = std::fs::remove_file(path);
                    return Err(DriverError::fetch(
                        &self.version,
                        &self.url,
                        format!("body truncated: expected {expected} bytes, received {written}"),
                    ));
                }
                tracing::info!(
                    path = %path.display(),
                    bytes = written,
                    url = %self.url,
                    "Installed release binary"
                );
                Ok(written)
            }
            Err(err) => match self.read_failure.take() {
                Some(reason) => Err(DriverError::fetch(&self.version, &self.url, reason)),
                None => Err(err),
            },
        }
    }
}

impl AsyncRead for AssetStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let poll = self.reader.as_mut().poll_read(cx, buf);
        if let Poll::Ready(Err(e)) = &poll {
            self.read_failure = Some(e.to_string());
        }
        poll
    }
}
