pub mod fs;

use std::path::Path;

use airgap_driver_shared::constants::logging;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter taken from `RUST_LOG`, falling back to `info` for this crate.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging::DEFAULT_FILTER))
}

/// Route driver events to a daily rotated file under `log_dir`.
///
/// Meant for host binaries that run drivers unattended, where the install
/// script's stderr lines must survive the process. The filter comes from
/// `RUST_LOG` (see [`default_env_filter`]).
///
/// # Arguments
/// * `log_dir` - Directory for `airgap-driver.log.<date>` files, created if missing
///
/// # Returns
/// * `Ok(guard)` - Keep it alive for the life of the process; dropping it flushes
///   buffered lines
/// * `Err(DriverError::Config)` - `log_dir` could not be created
///
/// If a global subscriber is already installed it is left in place and the
/// file only receives events once that subscriber is gone.
pub fn init_file_logging(log_dir: &Path) -> DriverResult<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| DriverError::config(log_dir, format!("failed to create log dir: {e}")))?;

    let appender = tracing_appender::rolling::daily(log_dir, logging::FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    install_subscriber(writer, default_env_filter());

    Ok(guard)
}

fn install_subscriber<W>(writer: W, env_filter: EnvFilter)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}
