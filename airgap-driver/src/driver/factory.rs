//! Factory pattern for driver construction.

use crate::driver::{Driver, DriverOptions};
use airgap_driver_shared::errors::DriverResult;

/// Factory trait for creating distribution drivers.
pub trait DriverFactory {
    type Driver: Driver;

    /// Create a driver instance with the provided options
    fn create(options: DriverOptions) -> DriverResult<Self::Driver>;
}
