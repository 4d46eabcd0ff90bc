//! Driver factory registry using the inventory pattern for compile-time registration.
//!
//! Distributions register themselves with `inventory::submit!`. Adding one
//! never touches the orchestrator or this file.

use crate::driver::{Driver, DriverOptions};
use airgap_driver_shared::errors::{DriverError, DriverResult};

/// Type alias for driver factory functions.
pub type DriverFactoryFn = fn(DriverOptions) -> DriverResult<Box<dyn Driver>>;

/// Registration entry submitted by distribution implementations via inventory.
pub struct DriverRegistration {
    /// Distribution name the driver is selected by
    pub name: &'static str,
    pub factory: DriverFactoryFn,
}

inventory::collect!(DriverRegistration);

/// Create a driver by looking up the factory registered under `name`.
///
/// # Arguments
/// * `name` - Distribution name, e.g. "k3s"
/// * `options` - Construction options passed to the factory
///
/// # Returns
/// * `Ok(Box<dyn Driver>)` - Driver created
/// * `Err(DriverError::UnknownDistribution)` - No factory under `name`; lists the registered names
/// * `Err(...)` - The factory rejected `options`
///
/// # Example
/// ```rust,no_run
/// use airgap_driver::driver::{self, DriverOptions};
///
/// let options = DriverOptions::default().with_version("v1.22.2+k3s2");
/// let driver = driver::create_driver("k3s", options)?;
/// assert_eq!(driver.name(), "k3s");
/// # Ok::<(), airgap_driver::DriverError>(())
/// ```
pub fn create_driver(name: &str, options: DriverOptions) -> DriverResult<Box<dyn Driver>> {
    for registration in inventory::iter::<DriverRegistration> {
        if registration.name == name {
            tracing::debug!(distribution = %name, version = %options.version, "Creating driver instance");
            return (registration.factory)(options);
        }
    }

    Err(DriverError::UnknownDistribution {
        name: name.to_string(),
        available: available_drivers().into_iter().map(String::from).collect(),
    })
}

/// Check if a distribution name is registered.
pub fn is_registered(name: &str) -> bool {
    inventory::iter::<DriverRegistration>().any(|r| r.name == name)
}

/// Names of all registered distributions, sorted.
pub fn available_drivers() -> Vec<&'static str> {
    let mut names: Vec<_> = inventory::iter::<DriverRegistration>()
        .map(|r| r.name)
        .collect();
    names.sort_unstable();
    names
}
