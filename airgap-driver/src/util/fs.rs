//! Atomic file writes.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use airgap_driver_shared::errors::{DriverError, DriverResult};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Write `bytes` to `path` via a temp file in the same directory plus rename.
///
/// Readers never observe a partially written file. The final file carries
/// exactly `mode`, independent of the process umask.
pub fn write_atomic(path: &Path, bytes: &[u8], mode: u32) -> DriverResult<()> {
    let mut tmp = temp_beside(path)?;

    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| DriverError::config(path, format!("failed to write temp file: {e}")))?;

    finish(tmp, path, mode)
}

/// Stream `reader` into `path` atomically.
///
/// Returns the number of bytes written.
pub async fn copy_atomic<R>(reader: &mut R, path: &Path, mode: u32) -> DriverResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let tmp = temp_beside(path)?;

    let std_file = tmp
        .reopen()
        .map_err(|e| DriverError::config(path, format!("failed to reopen temp file: {e}")))?;
    let mut file = tokio::fs::File::from_std(std_file);

    let written = tokio::io::copy(reader, &mut file)
        .await
        .map_err(|e| DriverError::config(path, format!("failed to stream into temp file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| DriverError::config(path, format!("failed to flush temp file: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| DriverError::config(path, format!("failed to sync temp file: {e}")))?;
    drop(file);

    finish(tmp, path, mode)?;
    Ok(written)
}

fn temp_beside(path: &Path) -> DriverResult<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::create_dir_all(dir)
        .map_err(|e| DriverError::config(dir, format!("failed to create directory: {e}")))?;

    NamedTempFile::new_in(dir)
        .map_err(|e| DriverError::config(dir, format!("failed to create temp file: {e}")))
}

fn finish(tmp: NamedTempFile, path: &Path, mode: u32) -> DriverResult<()> {
    std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))
        .map_err(|e| DriverError::config(path, format!("failed to set permissions: {e}")))?;

    tmp.persist(path)
        .map_err(|e| DriverError::config(path, format!("failed to rename into place: {}", e.error)))?;
    Ok(())
}
